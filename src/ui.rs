use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dispensary_match::report::yes_no;
use dispensary_match::{Confidence, ExportRow, MatchSummary, MatchType};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Summary,
    MasterList,
    Views,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    None,
    AllRecords,
    ByMatchType(MatchType),
    ByConfidence(Confidence),
}

impl FilterType {
    fn label(&self) -> String {
        match self {
            FilterType::None | FilterType::AllRecords => "ALL".to_string(),
            FilterType::ByMatchType(m) => m.to_string(),
            FilterType::ByConfidence(c) => format!("{} confidence", c),
        }
    }

    fn accepts(&self, row: &ExportRow) -> bool {
        match self {
            FilterType::None | FilterType::AllRecords => true,
            FilterType::ByMatchType(m) => row.match_type == *m,
            FilterType::ByConfidence(c) => row.confidence_score == *c,
        }
    }
}

/// Views page entries, in key order ('1'..'9')
const VIEW_FILTERS: [FilterType; 9] = [
    FilterType::AllRecords,
    FilterType::ByMatchType(MatchType::LicenseExact),
    FilterType::ByMatchType(MatchType::AddressName),
    FilterType::ByMatchType(MatchType::AddressOnly),
    FilterType::ByMatchType(MatchType::AddressPartial),
    FilterType::ByMatchType(MatchType::NoMatch),
    FilterType::ByConfidence(Confidence::High),
    FilterType::ByConfidence(Confidence::MediumHigh),
    FilterType::ByConfidence(Confidence::Medium),
];

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Summary => Page::MasterList,
            Page::MasterList => Page::Views,
            Page::Views => Page::Summary,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Summary => Page::Views,
            Page::MasterList => Page::Summary,
            Page::Views => Page::MasterList,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Summary => "Summary",
            Page::MasterList => "Master List",
            Page::Views => "Views",
        }
    }
}

pub struct App {
    pub run_label: String,
    pub records: Vec<ExportRow>,
    pub filtered: Vec<ExportRow>,
    pub summary: MatchSummary,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub active_filter: FilterType,
}

impl App {
    pub fn new(run_label: String, records: Vec<ExportRow>) -> Self {
        let mut state = TableState::default();
        if !records.is_empty() {
            state.select(Some(0));
        }

        let summary = MatchSummary::from_rows(&records);
        let filtered = records.clone();

        Self {
            run_label,
            records,
            filtered,
            summary,
            state,
            current_page: Page::MasterList,
            show_detail: false,
            active_filter: FilterType::None,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_record(&self) -> Option<&ExportRow> {
        self.state.selected().and_then(|i| self.filtered.get(i))
    }

    pub fn apply_filter(&mut self, filter: FilterType) {
        self.active_filter = filter;
        self.filtered = self
            .records
            .iter()
            .filter(|r| filter.accepts(r))
            .cloned()
            .collect();

        // Reset selection to first item
        if !self.filtered.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(FilterType::None);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.filtered.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }

    /// Number of records a view filter would show
    pub fn count_for(&self, filter: FilterType) -> usize {
        self.records.iter().filter(|r| filter.accepts(r)).count()
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::MasterList;
                }
                KeyCode::Char(d @ '1'..='9') if app.current_page == Page::Views => {
                    let slot = d as usize - '1' as usize;
                    app.apply_filter(VIEW_FILTERS[slot]);
                    app.current_page = Page::MasterList;
                }
                KeyCode::Char('0') if app.current_page == Page::Views => {
                    app.apply_filter(FilterType::ByConfidence(Confidence::Low));
                    app.current_page = Page::MasterList;
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => {
                    if !app.filtered.is_empty() {
                        app.state.select(Some(0));
                    }
                }
                KeyCode::End => {
                    if !app.filtered.is_empty() {
                        app.state.select(Some(app.filtered.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::MasterList {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Summary => render_summary(f, chunks[1], app),
            Page::MasterList => render_table(f, chunks[1], app),
            Page::Views => render_views(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn match_color(match_type: MatchType) -> Color {
    match match_type {
        MatchType::LicenseExact => Color::Green,
        MatchType::AddressName => Color::Cyan,
        MatchType::AddressOnly | MatchType::AddressPartial => Color::Yellow,
        MatchType::NoMatch => Color::Red,
    }
}

fn confidence_color(confidence: Confidence) -> Color {
    match confidence {
        Confidence::High => Color::Green,
        Confidence::MediumHigh => Color::Cyan,
        Confidence::Medium => Color::Yellow,
        Confidence::Low => Color::Red,
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Summary, Page::MasterList, Page::Views].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Total: {}", app.summary.total),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("✓ {}", app.summary.verified),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("✗ {}", app.summary.total - app.summary.verified),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", app.run_label)),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Dispensary", "Hoodie ID", "License", "Match", "Confidence", "OLCC Business"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.filtered.iter().map(|r| {
        let cells = vec![
            Cell::from(truncate(&r.survey_display_name, 40)),
            Cell::from(r.hoodie_id.clone()),
            Cell::from(r.verified_license.clone()),
            Cell::from(r.match_type.as_str()).style(Style::default().fg(match_color(r.match_type))),
            Cell::from(r.confidence_score.as_str())
                .style(Style::default().fg(confidence_color(r.confidence_score))),
            Cell::from(truncate(&r.olcc_business_name, 30)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(42),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(32),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Master List "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.filtered.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if !matches!(app.active_filter, FilterType::None | FilterType::AllRecords) {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", app.active_filter.label()),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    for (key, hint, color) in [
        ("Enter", " Details", Color::Yellow),
        ("Tab", " Page", Color::Yellow),
        ("↑/↓", " Nav", Color::Yellow),
        ("PgUp/PgDn", " Fast", Color::Yellow),
        ("q", " Quit", Color::Red),
    ] {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, Style::default().fg(color)));
        status_spans.push(Span::raw(hint));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let summary = &app.summary;
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Total dispensaries: ", label),
            Span::raw(summary.total.to_string()),
        ]),
        Line::from(vec![
            Span::styled("  Verified: ", label),
            Span::styled(summary.verified.to_string(), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::styled("  Verification rate: ", label),
            Span::raw(format!("{:.1}%", summary.verification_rate * 100.0)),
        ]),
        Line::from(vec![
            Span::styled("  Weighted verification rate: ", label),
            Span::raw(format!("{:.1}%", summary.weighted_verification_rate * 100.0)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  CONFIDENCE",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
    ];

    for confidence in Confidence::ALL {
        content.push(Line::from(vec![
            Span::styled(
                format!("  {:<14}", confidence.as_str()),
                Style::default().fg(confidence_color(confidence)),
            ),
            Span::raw(format!("{:>6}", summary.count_for_confidence(confidence))),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  MATCH TYPE",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    )));

    for match_type in MatchType::ALL {
        content.push(Line::from(vec![
            Span::styled(
                format!("  {:<16}", match_type.as_str()),
                Style::default().fg(match_color(match_type)),
            ),
            Span::raw(format!("{:>6}", summary.count_for(match_type))),
        ]));
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Summary - Verification Statistics "),
    );

    f.render_widget(paragraph, area);
}

fn render_views(f: &mut Frame, area: Rect, app: &App) {
    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Quick Views & Filters",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    let keyed = VIEW_FILTERS
        .iter()
        .enumerate()
        .map(|(i, filter)| (char::from(b'1' + i as u8), *filter))
        .chain(std::iter::once(('0', FilterType::ByConfidence(Confidence::Low))));

    for (key, filter) in keyed {
        let marker = if app.active_filter == filter {
            Span::styled("→", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            Span::raw(" ")
        };

        content.push(Line::from(vec![
            Span::raw("  "),
            marker,
            Span::styled(key.to_string(), Style::default().fg(Color::Yellow)),
            Span::raw(format!(". {:<28}", filter.label())),
            Span::styled(
                format!("{:>5} records", app.count_for(filter)),
                Style::default().fg(Color::White),
            ),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![
        Span::styled(
            "  Hint: ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ),
        Span::styled(
            "Press 0-9 to filter, c to clear",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ),
    ]));

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Views - Quick Access Filters "),
    );

    f.render_widget(paragraph, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let r = match app.selected_record() {
        Some(r) => r,
        None => {
            let no_selection = Paragraph::new("No record selected").block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Record Details "),
            );
            f.render_widget(no_selection, area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: &str| {
        Line::from(vec![Span::styled(name, label), Span::raw(value.to_string())])
    };

    let content = vec![
        Line::from(""),
        field("  Dispensary: ", &r.survey_display_name),
        field("  Hoodie ID: ", &r.hoodie_id),
        field("  Hoodie License: ", &r.hoodie_license),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(Span::styled(
            "  VERIFICATION",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Match: ", label),
            Span::styled(r.match_type.as_str(), Style::default().fg(match_color(r.match_type))),
        ]),
        Line::from(vec![
            Span::styled("  Confidence: ", label),
            Span::styled(
                r.confidence_score.as_str(),
                Style::default().fg(confidence_color(r.confidence_score)),
            ),
        ]),
        field("  Verified: ", yes_no::as_str(r.is_verified)),
        field("  Verified License: ", &r.verified_license),
        field("  OLCC Business: ", &r.olcc_business_name),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                wrap_text(&r.verification_notes, 35),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Record Details "),
    );

    f.render_widget(detail_panel, area);
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines.join("\n  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, match_type: MatchType) -> ExportRow {
        ExportRow {
            survey_display_name: format!("{} - 1 Main St", id),
            hoodie_id: id.to_string(),
            hoodie_license: String::new(),
            verified_license: String::new(),
            olcc_business_name: String::new(),
            match_type,
            verification_notes: String::new(),
            confidence_score: Confidence::for_match(match_type),
            is_verified: match_type != MatchType::NoMatch,
        }
    }

    fn app() -> App {
        App::new(
            "test run".to_string(),
            vec![
                row("H1", MatchType::LicenseExact),
                row("H2", MatchType::NoMatch),
                row("H3", MatchType::AddressOnly),
                row("H4", MatchType::AddressPartial),
            ],
        )
    }

    #[test]
    fn test_filter_by_match_type_and_confidence() {
        let mut app = app();

        app.apply_filter(FilterType::ByMatchType(MatchType::NoMatch));
        assert_eq!(app.filtered.len(), 1);
        assert_eq!(app.selected_record().unwrap().hoodie_id, "H2");

        app.apply_filter(FilterType::ByConfidence(Confidence::Medium));
        assert_eq!(app.filtered.len(), 2);

        app.apply_filter(FilterType::ByMatchType(MatchType::AddressName));
        assert!(app.filtered.is_empty());
        assert!(app.selected_record().is_none());

        app.clear_filter();
        assert_eq!(app.filtered.len(), 4);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();

        app.previous();
        assert_eq!(app.state.selected(), Some(3));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(3));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_view_counts_match_summary() {
        let app = app();

        assert_eq!(app.count_for(FilterType::AllRecords), 4);
        assert_eq!(app.count_for(FilterType::ByConfidence(Confidence::Low)), 1);
        assert_eq!(app.summary.verified, 3);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Café Cannabis Co", 8), "Café ...");
        assert_eq!(truncate("short", 8), "short");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("Perfect license match", 35), "Perfect license match");
        assert_eq!(wrap_text("aaa bbb ccc", 7), "aaa bbb\n  ccc");
    }
}
