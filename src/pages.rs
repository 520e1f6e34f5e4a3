//! Server-rendered HTML for the browser-facing routes, built from the Tera
//! templates under `templates/`.

use crate::climate::{self, ClimateSeries};
use crate::error::AppResult;
use crate::metrics::SelectionMetrics;
use crate::models::{iso8601, AvailableFile, FileSummary, SelectedLine, TrackedFile};
use crate::pagination::Page;
use crate::plot::PlotType;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tera::{Context, Tera};

const TEMPLATES: [(&str, &str); 10] = [
    ("base.html", include_str!("../templates/base.html")),
    ("file_list.html", include_str!("../templates/file_list.html")),
    ("select_file.html", include_str!("../templates/select_file.html")),
    ("refresh_files.html", include_str!("../templates/refresh_files.html")),
    ("view_file.html", include_str!("../templates/view_file.html")),
    ("selected_lines.html", include_str!("../templates/selected_lines.html")),
    ("plot_selection.html", include_str!("../templates/plot_selection.html")),
    ("plot_data.html", include_str!("../templates/plot_data.html")),
    ("custom_plot.html", include_str!("../templates/custom_plot.html")),
    ("error.html", include_str!("../templates/error.html")),
];

/// Messages carried across redirects as `?notice=<code>`
pub fn notice_message(code: &str) -> Option<&'static str> {
    match code {
        "not_found" => Some("That file is not tracked."),
        "file_access" => Some("Selected file not found or inaccessible."),
        "no_selection" => Some("No selected content found for that file."),
        "deleted" => Some("File removed together with its selections."),
        _ => None,
    }
}

fn load_templates() -> AppResult<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES)?;
    tera.autoescape_on(vec![".html"]);
    Ok(tera)
}

fn templates() -> AppResult<&'static Tera> {
    static TERA: OnceLock<Tera> = OnceLock::new();
    if let Some(tera) = TERA.get() {
        return Ok(tera);
    }
    let tera = load_templates()?;
    Ok(TERA.get_or_init(|| tera))
}

/// Title and messages shared by every page
#[derive(Serialize)]
struct Frame<'a> {
    title: String,
    notice: Option<&'a str>,
    errors: &'a [String],
}

impl<'a> Frame<'a> {
    fn new(title: impl Into<String>, notice: Option<&'a str>, errors: &'a [String]) -> Self {
        Self {
            title: title.into(),
            notice,
            errors,
        }
    }
}

fn render<T: Serialize>(name: &str, page: &T) -> AppResult<String> {
    let context = Context::from_serialize(page)?;
    Ok(templates()?.render(name, &context)?)
}

#[derive(Serialize)]
struct FileRow<'a> {
    id: i64,
    name: &'a str,
    file_path: &'a str,
    processed_at: String,
}

#[derive(Serialize)]
struct FileListPage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    files: Vec<FileRow<'a>>,
}

pub fn file_list(files: &[TrackedFile], notice: Option<&str>) -> AppResult<String> {
    let page = FileListPage {
        frame: Frame::new("Tracked files", notice, &[]),
        files: files
            .iter()
            .map(|f| FileRow {
                id: f.id,
                name: &f.name,
                file_path: &f.file_path,
                processed_at: iso8601(f.processed_at),
            })
            .collect(),
    };
    render("file_list.html", &page)
}

#[derive(Serialize)]
struct SelectFilePage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    directory: &'a str,
    files: &'a [AvailableFile],
}

pub fn select_file(
    available: &[AvailableFile],
    directory: &str,
    notice: Option<&str>,
    errors: &[String],
) -> AppResult<String> {
    let page = SelectFilePage {
        frame: Frame::new("Select a file", notice, errors),
        directory,
        files: available,
    };
    render("select_file.html", &page)
}

#[derive(Serialize)]
struct AvailableRow<'a> {
    name: &'a str,
    size: u64,
    modified: String,
}

#[derive(Serialize)]
struct RefreshPage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    directory: &'a str,
    files: Vec<AvailableRow<'a>>,
}

pub fn refresh_files(
    available: &[AvailableFile],
    directory: &str,
    advisory: Option<&str>,
) -> AppResult<String> {
    let page = RefreshPage {
        frame: Frame::new("Available files", advisory, &[]),
        directory,
        files: available
            .iter()
            .map(|f| AvailableRow {
                name: &f.name,
                size: f.size,
                modified: iso8601(f.modified),
            })
            .collect(),
    };
    render("refresh_files.html", &page)
}

pub struct FileView<'a> {
    pub file: &'a TrackedFile,
    pub page: &'a Page,
    pub lines: &'a [String],
    pub selected: &'a HashSet<i64>,
    pub total_lines: usize,
}

#[derive(Serialize)]
struct LineRow<'a> {
    /// 0-based index into the file, used as the checkbox name
    index: usize,
    line_number: usize,
    text: &'a str,
    checked: bool,
}

#[derive(Serialize)]
struct ViewFilePage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    file_id: i64,
    total_lines: usize,
    page_number: usize,
    page_count: usize,
    previous_page: Option<usize>,
    next_page: Option<usize>,
    rows: Vec<LineRow<'a>>,
}

pub fn view_file(view: &FileView<'_>, notice: Option<&str>) -> AppResult<String> {
    let FileView {
        file,
        page,
        lines,
        selected,
        total_lines,
    } = view;

    let rows = lines
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let index = page.start_offset + i;
            LineRow {
                index,
                line_number: index + 1,
                text,
                checked: selected.contains(&((index + 1) as i64)),
            }
        })
        .collect();

    let context = ViewFilePage {
        frame: Frame::new(file.name.as_str(), notice, &[]),
        file_id: file.id,
        total_lines: *total_lines,
        page_number: page.number,
        page_count: page.page_count.max(1),
        previous_page: page.previous_number(),
        next_page: page.next_number(),
        rows,
    };
    render("view_file.html", &context)
}

#[derive(Serialize)]
struct SelectedRow<'a> {
    line_number: i64,
    content: &'a str,
    selected_at: String,
}

#[derive(Serialize)]
struct SelectedLinesPage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    file_id: i64,
    rows: Vec<SelectedRow<'a>>,
}

pub fn selected_lines(file: &TrackedFile, selected: &[SelectedLine]) -> AppResult<String> {
    let page = SelectedLinesPage {
        frame: Frame::new(format!("Selected lines of {}", file.name), None, &[]),
        file_id: file.id,
        rows: selected
            .iter()
            .map(|line| SelectedRow {
                line_number: line.line_number,
                content: &line.content,
                selected_at: iso8601(line.selected_at),
            })
            .collect(),
    };
    render("selected_lines.html", &page)
}

#[derive(Serialize)]
struct PlotSelectionPage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    total_files: i64,
    total_selected: i64,
    files: &'a [FileSummary],
}

pub fn plot_selection(
    summaries: &[FileSummary],
    totals: (i64, i64),
    notice: Option<&str>,
    errors: &[String],
) -> AppResult<String> {
    let page = PlotSelectionPage {
        frame: Frame::new("Plots", notice, errors),
        total_files: totals.0,
        total_selected: totals.1,
        files: summaries,
    };
    render("plot_selection.html", &page)
}

#[derive(Serialize)]
struct PlotLink {
    kind: &'static str,
    title: &'static str,
}

#[derive(Serialize)]
struct PlotDataPage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    file_id: i64,
    line_count: usize,
    mean_length: String,
    mean_word_count: String,
    mean_gap: Option<String>,
    plots: Vec<PlotLink>,
}

pub fn plot_page(file: &TrackedFile, metrics: &SelectionMetrics) -> AppResult<String> {
    let page = PlotDataPage {
        frame: Frame::new(format!("Plots for {}", file.name), None, &[]),
        file_id: file.id,
        line_count: metrics.lines.len(),
        mean_length: format!("{:.1}", metrics.mean_length),
        mean_word_count: format!("{:.1}", metrics.mean_word_count),
        mean_gap: metrics.mean_gap.map(|gap| format!("{:.1}", gap)),
        plots: PlotType::SELECTION
            .into_iter()
            .map(|t| PlotLink {
                kind: t.as_str(),
                title: t.title(),
            })
            .collect(),
    };
    render("plot_data.html", &page)
}

#[derive(Serialize)]
struct CustomPlotPage<'a> {
    #[serde(flatten)]
    frame: Frame<'a>,
    file_id: i64,
    kind: &'static str,
    line_count: usize,
    reading_count: usize,
    first: String,
    last: String,
}

pub fn custom_plot_page(
    file: &TrackedFile,
    line_count: usize,
    series: &ClimateSeries,
) -> AppResult<String> {
    let (first, last) = series.span().unwrap_or_default();
    let page = CustomPlotPage {
        frame: Frame::new(format!("Room climate for {}", file.name), None, &[]),
        file_id: file.id,
        kind: PlotType::RoomClimate.as_str(),
        line_count,
        reading_count: series.len(),
        first: climate::clock(first as f64),
        last: climate::clock(last as f64),
    };
    render("custom_plot.html", &page)
}

pub fn error_page(title: &str, errors: &[String]) -> AppResult<String> {
    render("error.html", &Frame::new(title, None, errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::Paginator;

    fn tracked() -> TrackedFile {
        TrackedFile {
            id: 7,
            name: "room_<b>.txt".to_string(),
            file_path: "/tmp/room_<b>.txt".to_string(),
            processed_at: 0,
        }
    }

    #[test]
    fn test_templates_load() {
        let tera = load_templates().unwrap();
        for (name, _) in TEMPLATES {
            assert!(tera.get_template_names().any(|n| n == name));
        }
    }

    #[test]
    fn test_view_file_marks_selected_lines() {
        let file = tracked();
        let lines: Vec<String> = (1..=5).map(|i| format!("line {}", i)).collect();
        let page = Paginator::new(lines.len(), 2).page(2);
        let selected = HashSet::from([3]);

        let html = view_file(
            &FileView {
                file: &file,
                page: &page,
                lines: page.slice(&lines),
                selected: &selected,
                total_lines: lines.len(),
            },
            None,
        )
        .unwrap();

        assert!(html.contains(r#"name="line_2" checked"#));
        assert!(html.contains(r#"name="line_3">"#));
        assert!(!html.contains(r#"name="line_4""#));
        assert!(html.contains("save_and_next"));
        assert!(html.contains("5 lines, page 2 of 3"));
        assert!(html.contains("room_&lt;b&gt;.txt"));
        assert!(!html.contains("room_<b>"));
    }

    #[test]
    fn test_long_lines_are_shortened() {
        let file = tracked();
        let lines = vec!["x".repeat(150)];
        let page = Paginator::new(1, 10).page(1);

        let html = view_file(
            &FileView {
                file: &file,
                page: &page,
                lines: page.slice(&lines),
                selected: &HashSet::new(),
                total_lines: 1,
            },
            None,
        )
        .unwrap();

        assert!(html.contains(&format!("<code>{}...</code>", "x".repeat(100))));
        assert!(!html.contains(&"x".repeat(101)));
    }

    #[test]
    fn test_selected_lines_escape_content() {
        let selected = vec![SelectedLine {
            id: 1,
            file_id: 7,
            line_number: 4,
            content: "<script>alert(1)</script>".to_string(),
            selected_at: 0,
        }];

        let html = selected_lines(&tracked(), &selected).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("1970-01-01T00:00:00+00:00"));
    }

    #[test]
    fn test_empty_listings() {
        let html = file_list(&[], Some("File removed together with its selections.")).unwrap();
        assert!(html.contains("No files tracked yet"));
        assert!(html.contains(r#"<p class="notice">File removed"#));

        let errors = vec!["Please select a file to plot.".to_string()];
        let html = plot_selection(&[], (0, 0), None, &errors).unwrap();
        assert!(html.contains("No processed files available"));
        assert!(html.contains(r#"<p class="error">Please select a file to plot.</p>"#));
    }

    #[test]
    fn test_plot_page_lists_selection_plots() {
        let metrics = SelectionMetrics::derive(vec![(1, "a b"), (4, "c")]);
        let html = plot_page(&tracked(), &metrics).unwrap();

        for plot_type in PlotType::SELECTION {
            assert!(html.contains(&format!("/download/7/{}/?inline=true", plot_type)));
        }
        assert!(html.contains("mean gap 3.0"));
        assert!(html.contains("/plot/7/custom/"));
    }

    #[test]
    fn test_notice_codes() {
        assert!(notice_message("not_found").is_some());
        assert!(notice_message("<script>").is_none());
    }
}
