use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

use crate::climate::ClimateSeries;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::files::{self, FileFilter};
use crate::ledger::SelectionLedger;
use crate::lines;
use crate::metrics::{self, SelectionMetrics};
use crate::models::{
    iso8601, ActionResponse, AvailableFile, FileSummary, SelectionData, SelectionEntry,
};
use crate::pages::{self, FileView};
use crate::pagination::Paginator;
use crate::plot::{self, PlotType};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub page: Option<String>,
    pub notice: Option<String>,
    /// Lines selected by the previous submit, echoed back after the redirect
    pub saved: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectFileForm {
    pub selected_file: Option<String>,
}

/// Failure of a browser-facing route: redirects with a notice where a user
/// can recover, otherwise an HTML error page.
#[derive(Debug)]
pub struct PageError(AppError);

impl From<AppError> for PageError {
    fn from(e: AppError) -> Self {
        PageError(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::NotFound(what) => {
                log::warn!("{} not found", what);
                Redirect::to("/?notice=not_found").into_response()
            }
            e @ AppError::FileAccess { .. } => {
                log::warn!("{}", e);
                Redirect::to("/select/?notice=file_access").into_response()
            }
            AppError::Validation(errors) => {
                error_response(StatusCode::BAD_REQUEST, "Invalid submission", &errors)
            }
            AppError::UnsupportedPlotType(name) => {
                (StatusCode::BAD_REQUEST, format!("Invalid plot type: {}", name)).into_response()
            }
            e => {
                log::error!("Request failed: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error", &[e.to_string()])
            }
        }
    }
}

/// HTML error page, or the bare messages if even that fails to render
fn error_response(status: StatusCode, title: &str, errors: &[String]) -> Response {
    match pages::error_page(title, errors) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            log::error!("Failed to render error page: {}", e);
            (status, errors.join("\n")).into_response()
        }
    }
}

/// Failure of a JSON route, reported as `{success: false, message}`.
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::FileAccess { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation(_) | AppError::UnsupportedPlotType(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Render(_) => {
                log::error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ActionResponse {
                success: false,
                message: format!("Error: {}", self.0),
            }),
        )
            .into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    // Configure CORS to allow localhost requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(file_list))
        .route("/select/", get(select_file_form).post(select_file_submit))
        .route("/refresh/", get(refresh_files))
        .route("/file/:id/", get(view_file).post(submit_page))
        .route("/file/:id/delete/", post(delete_file))
        .route("/selected/:id/", get(view_selected))
        .route("/select-all/:id/", post(select_all))
        .route("/clear-all/:id/", post(clear_all))
        .route("/plot/", get(plot_selection).post(plot_selection_submit))
        .route("/plot/:id/", get(plot_data))
        .route("/plot/:id/custom/", get(custom_plot))
        .route("/download/:id/:plot_type/", get(download_plot))
        .route("/api/data/:id/", get(api_data))
        .route("/api/metrics/:id/", get(api_metrics))
        .route("/api/files/", get(api_files))
        .route("/api/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    log::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Scan the text directory; failures become an advisory instead of an error.
fn scan_directory(config: &AppConfig) -> (Vec<AvailableFile>, Option<String>) {
    match files::list_available_files(config.text_directory(), &FileFilter::from_config(config)) {
        Ok(available) => (available, None),
        Err(e) => {
            log::warn!("Directory scan failed: {}", e);
            (Vec::new(), Some(format!("Error accessing directory: {}", e)))
        }
    }
}

async fn file_list(
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, PageError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.list_files()?;
    let notice = query.notice.as_deref().and_then(pages::notice_message);

    Ok(Html(pages::file_list(&tracked, notice)?))
}

async fn select_file_form(
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, PageError> {
    let config = state.config.get().await;
    let (available, advisory) = scan_directory(&config);
    let notice = query.notice.as_deref().and_then(pages::notice_message);

    Ok(Html(pages::select_file(
        &available,
        &config.text_directory,
        notice.or(advisory.as_deref()),
        &[],
    )?))
}

async fn select_file_submit(
    State(state): State<AppState>,
    Form(form): Form<SelectFileForm>,
) -> Result<Response, PageError> {
    let config = state.config.get().await;
    let (available, advisory) = scan_directory(&config);

    let requested = form.selected_file.unwrap_or_default();
    let requested = requested.trim();
    let choice = available.iter().find(|f| f.path == requested);

    let Some(choice) = choice else {
        let error = if requested.is_empty() {
            "Please select a file.".to_string()
        } else {
            "Select a valid choice. That file is not one of the available choices.".to_string()
        };
        let html = pages::select_file(
            &available,
            &config.text_directory,
            advisory.as_deref(),
            &[error],
        )?;
        return Ok((StatusCode::BAD_REQUEST, Html(html)).into_response());
    };

    if !std::path::Path::new(&choice.path).is_file() {
        return Err(AppError::file_access(
            &choice.path,
            std::io::Error::from(std::io::ErrorKind::NotFound),
        )
        .into());
    }

    let mut ledger = SelectionLedger::open(&state.db_path)?;
    let (tracked, _) = ledger.get_or_create_file(&choice.path, &choice.name)?;

    Ok(Redirect::to(&format!("/file/{}/", tracked.id)).into_response())
}

async fn refresh_files(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let config = state.config.get().await;
    let (available, advisory) = scan_directory(&config);

    Ok(Html(pages::refresh_files(
        &available,
        &config.text_directory,
        advisory.as_deref(),
    )?))
}

async fn view_file(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
    Query(query): Query<ViewQuery>,
) -> Result<Html<String>, PageError> {
    let config = state.config.get().await;
    let ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let file_lines = lines::read_lines(std::path::Path::new(&tracked.file_path))?;

    let page = Paginator::new(file_lines.len(), config.page_size).page_from_query(query.page.as_deref());
    let selected = match page.line_span() {
        Some((first, last)) => ledger.selected_line_numbers(file_id, first as i64, last as i64)?,
        None => HashSet::new(),
    };

    let saved_message = query
        .saved
        .map(|count| format!("Updated selections for page {} ({} lines selected)", page.number, count));
    let notice = saved_message
        .as_deref()
        .or_else(|| query.notice.as_deref().and_then(pages::notice_message));

    let view = FileView {
        file: &tracked,
        page: &page,
        lines: page.slice(&file_lines),
        selected: &selected,
        total_lines: file_lines.len(),
    };
    Ok(Html(pages::view_file(&view, notice)?))
}

/// Which submit button was pressed on the viewer form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageAction {
    Save,
    SaveAndNext,
    SaveAndFinish,
}

/// Turn submitted `line_<index>` fields into per-line checkbox states for
/// the page covering `range`.
///
/// Fields that name no line of this page are skipped, so a file that shrank
/// between rendering and submitting still saves what is left of the page.
fn parse_page_form(fields: &[(String, String)], range: &std::ops::Range<usize>) -> (Vec<bool>, PageAction) {
    let mut checked = vec![false; range.len()];
    let mut action = PageAction::Save;

    for (key, _) in fields {
        match key.as_str() {
            "save_and_next" => action = PageAction::SaveAndNext,
            "save_and_finish" => action = PageAction::SaveAndFinish,
            _ => {
                let Some(raw) = key.strip_prefix("line_") else {
                    continue;
                };
                match raw.parse::<usize>() {
                    Ok(index) if range.contains(&index) => checked[index - range.start] = true,
                    _ => log::warn!("Ignoring {} outside lines {:?} of the page", key, range),
                }
            }
        }
    }

    (checked, action)
}

async fn submit_page(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
    Query(query): Query<ViewQuery>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let config = state.config.get().await;
    let mut ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let file_lines = lines::read_lines(std::path::Path::new(&tracked.file_path))?;

    let page = Paginator::new(file_lines.len(), config.page_size).page_from_query(query.page.as_deref());

    let (checked, action) = parse_page_form(&fields, &page.range);
    let count = ledger.toggle_page(file_id, page.slice(&file_lines), page.start_offset, &checked)?;

    let target = match (action, page.next_number()) {
        (PageAction::SaveAndNext, Some(next)) => format!("/file/{}/?page={}&saved={}", file_id, next, count),
        (PageAction::SaveAndFinish, _) => format!("/selected/{}/", file_id),
        _ => format!("/file/{}/?page={}&saved={}", file_id, page.number, count),
    };

    Ok(Redirect::to(&target).into_response())
}

async fn view_selected(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let selected = ledger.list_selected(file_id)?;

    Ok(Html(pages::selected_lines(&tracked, &selected)?))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Redirect, PageError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    ledger.delete_file(file_id)?;

    Ok(Redirect::to("/?notice=deleted"))
}

async fn select_all(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let count = ledger.select_all(&tracked)?;

    Ok(Json(ActionResponse {
        success: true,
        message: format!("Selected all {} lines", count),
    }))
}

async fn clear_all(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Json<ActionResponse>, ApiError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    ledger.get_file(file_id)?;
    let count = ledger.clear_all(file_id)?;

    Ok(Json(ActionResponse {
        success: true,
        message: format!("Cleared {} selections", count),
    }))
}

async fn api_data(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Json<SelectionData>, ApiError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let selected = ledger.list_selected(file_id)?;

    let data: Vec<SelectionEntry> = selected
        .into_iter()
        .map(|line| SelectionEntry {
            line_number: line.line_number,
            content_length: metrics::char_length(&line.content),
            word_count: metrics::word_count(&line.content),
            selected_at: iso8601(line.selected_at),
            content: line.content,
        })
        .collect();

    Ok(Json(SelectionData {
        file_name: tracked.name,
        file_path: tracked.file_path,
        total_lines: data.len(),
        data,
    }))
}

async fn api_metrics(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Json<SelectionMetrics>, ApiError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    ledger.get_file(file_id)?;
    let selected = ledger.list_selected(file_id)?;

    Ok(Json(SelectionMetrics::from_selection(&selected)))
}

async fn api_files(State(state): State<AppState>) -> Result<Json<Vec<FileSummary>>, ApiError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    Ok(Json(ledger.list_file_summaries()?))
}

async fn plot_selection(
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, PageError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    let summaries = ledger.list_file_summaries()?;
    let totals = ledger.totals()?;
    let notice = query.notice.as_deref().and_then(pages::notice_message);

    Ok(Html(pages::plot_selection(&summaries, totals, notice, &[])?))
}

async fn plot_selection_submit(
    State(state): State<AppState>,
    Form(form): Form<SelectFileForm>,
) -> Result<Response, PageError> {
    let chosen = form
        .selected_file
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok());

    match chosen {
        Some(file_id) => Ok(Redirect::to(&format!("/plot/{}/", file_id)).into_response()),
        None => {
            let ledger = SelectionLedger::open(&state.db_path)?;
            let summaries = ledger.list_file_summaries()?;
            let totals = ledger.totals()?;
            let html = pages::plot_selection(
                &summaries,
                totals,
                None,
                &["Please select a file to plot.".to_string()],
            )?;
            Ok((StatusCode::BAD_REQUEST, Html(html)).into_response())
        }
    }
}

async fn plot_data(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Response, PageError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let selected = ledger.list_selected(file_id)?;

    if selected.is_empty() {
        return Ok(Redirect::to("/plot/?notice=no_selection").into_response());
    }

    let metrics = SelectionMetrics::from_selection(&selected);
    Ok(Html(pages::plot_page(&tracked, &metrics)?).into_response())
}

/// Room climate view: the selection read as climate log readings.
async fn custom_plot(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Response, PageError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let selected = ledger.list_selected(file_id)?;

    if selected.is_empty() {
        return Ok(Redirect::to("/plot/?notice=no_selection").into_response());
    }

    let series = ClimateSeries::from_selection(&selected)?;
    Ok(Html(pages::custom_plot_page(&tracked, selected.len(), &series)?).into_response())
}

async fn download_plot(
    State(state): State<AppState>,
    Path((file_id, plot_type)): Path<(i64, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, PageError> {
    let ledger = SelectionLedger::open(&state.db_path)?;
    let tracked = ledger.get_file(file_id)?;
    let selected = ledger.list_selected(file_id)?;

    if selected.is_empty() {
        return Ok((StatusCode::NOT_FOUND, "No data found").into_response());
    }

    let plot_type: PlotType = plot_type.parse()?;
    let png = plot::render(plot_type, &selected)?;

    let disposition = if query.inline {
        "inline".to_string()
    } else {
        format!(
            "attachment; filename=\"{}_{}_plot.png\"",
            tracked.name.replace('"', ""),
            plot_type
        )
    };

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        png,
    )
        .into_response())
}
