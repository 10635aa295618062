//! CSV projection of the visible rows of a view.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::filter::DisplayRow;
use crate::role::RoleRegistry;
use crate::task::{ContractTask, TeamTask};

/// One exported column: the record field it reads and the header text it prints.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub field: String,
    pub header_name: String,
}

impl Column {
    #[must_use]
    pub fn new(field: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            header_name: header_name.into(),
        }
    }
}

/// Field lookup by column name. `None` exports as an empty cell.
pub trait CsvFields {
    fn field_value(&self, field: &str) -> Option<Cow<'_, str>>;
}

impl CsvFields for TeamTask {
    fn field_value(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            "id" => Some(Cow::Borrowed(self.id.as_str())),
            "task" => Some(Cow::Borrowed(self.task.as_str())),
            "category" => Some(Cow::Borrowed(self.category.as_str())),
            role => {
                let state = self.assignments.get(role)?;
                Some(Cow::Borrowed(state.as_str()))
            }
        }
    }
}

impl CsvFields for ContractTask {
    fn field_value(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            "id" => Some(Cow::Borrowed(self.id.as_str())),
            "page" => Some(Cow::Borrowed(self.page.as_str())),
            "article" => Some(Cow::Borrowed(self.article.as_str())),
            "task" => Some(Cow::Borrowed(self.task.as_str())),
            "responsible" => self.responsible.as_deref().map(Cow::Borrowed),
            _ => None,
        }
    }
}

/// Render `rows` as CSV: one header line, then one line per task row in column order.
///
/// Category headers are skipped. Every cell is double-quoted with embedded quotes doubled, and
/// lines are joined with `\n` without a trailing newline.
#[must_use]
pub fn export_csv<T: CsvFields>(rows: &[DisplayRow<'_, T>], columns: &[Column]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    let headers = columns
        .iter()
        .map(|column| Cow::Borrowed(column.header_name.as_str()));
    lines.push(join_cells(headers));
    for task in rows.iter().filter_map(DisplayRow::task) {
        let cells = columns.iter().map(|column| cell(task, &column.field));
        lines.push(join_cells(cells));
    }
    lines.join("\n")
}

fn cell<'a, T: CsvFields>(task: &'a T, field: &str) -> Cow<'a, str> {
    task.field_value(field).unwrap_or(Cow::Borrowed(""))
}

fn join_cells<'a>(cells: impl Iterator<Item = Cow<'a, str>>) -> String {
    cells.map(|cell| quote(&cell)).collect::<Vec<_>>().join(",")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Team matrix columns: category, task, then one column per project role.
#[must_use]
pub fn team_columns(registry: &RoleRegistry, active_only: bool) -> Vec<Column> {
    let mut columns = vec![
        Column::new("category", "Category"),
        Column::new("task", "Task"),
    ];
    for role in registry.list_project_roles(active_only) {
        columns.push(Column::new(role.key.clone(), role.label.clone()));
    }
    columns
}

#[must_use]
pub fn contract_columns() -> Vec<Column> {
    vec![
        Column::new("page", "Page"),
        Column::new("article", "Article"),
        Column::new("task", "Task"),
        Column::new("responsible", "Responsible"),
    ]
}

/// Download name for an export, e.g. `team_responsibility_2026-10-19.csv`.
#[must_use]
pub fn export_file_name(view_slug: &str, date: Date) -> String {
    format!(
        "{view_slug}_responsibility_{:04}-{:02}-{:02}.csv",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use time::Month;

    use super::*;
    use crate::filter::{group_for_display, plain_rows};
    use crate::role::Role;
    use crate::task::AssignmentState;

    fn read_csv(text: &str) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(text.as_bytes());
        reader
            .records()
            .map(|record| match record {
                Ok(record) => record.iter().map(str::to_string).collect(),
                Err(err) => panic!("exported CSV should parse: {err}"),
            })
            .collect()
    }

    fn registry() -> RoleRegistry {
        RoleRegistry::new(
            vec![
                Role::new("PX", "Project Executive", ""),
                Role::new("PM1", "Project Manager", ""),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn team_export_skips_headers_and_renders_missing_roles_empty() {
        let tasks = vec![
            TeamTask::new("s1", "Site safety plan", "1. SAFETY")
                .with_assignment("PX", AssignmentState::Primary),
            TeamTask::new("q1", "Mockup review", "2. QUALITY")
                .with_assignment("PM1", AssignmentState::Support),
        ];
        let rows = group_for_display(&tasks);
        let csv = export_csv(&rows, &team_columns(&registry(), false));
        assert_eq!(
            csv,
            "\"Category\",\"Task\",\"Project Executive\",\"Project Manager\"\n\
             \"1. SAFETY\",\"Site safety plan\",\"X\",\"\"\n\
             \"2. QUALITY\",\"Mockup review\",\"\",\"Support\""
        );
        assert!(!csv.contains("undefined"));
        assert!(!csv.contains("null"));
    }

    #[test]
    fn inactive_roles_are_left_out_of_active_columns() {
        let registry = registry().with_active_keys(["PM1"]);
        let headers = team_columns(&registry, true)
            .into_iter()
            .map(|column| column.header_name)
            .collect::<Vec<_>>();
        assert_eq!(headers, vec!["Category", "Task", "Project Manager"]);
    }

    #[test]
    fn contract_export_renders_blank_responsible() {
        let tasks = vec![
            ContractTask::new("p1", "Insurance certificates").with_reference("4", "11.1"),
            ContractTask::new("p2", "Schedule of values").with_responsible("PM1"),
        ];
        let csv = export_csv(&plain_rows(&tasks), &contract_columns());
        let parsed = read_csv(&csv);
        assert_eq!(parsed[0], vec!["Page", "Article", "Task", "Responsible"]);
        assert_eq!(parsed[1], vec!["4", "11.1", "Insurance certificates", ""]);
        assert_eq!(parsed[2], vec!["", "", "Schedule of values", "PM1"]);
    }

    #[test]
    fn line_breaks_and_quotes_inside_cells_read_back_intact() {
        let description = "Submit\r\nclose-out \"O&M\" manuals";
        let task = ContractTask::new("p1", description).with_reference("7", "2,3");

        let csv = export_csv(&plain_rows(&[task]), &contract_columns());
        let parsed = read_csv(&csv);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], vec!["7", "2,3", description, ""]);
    }

    #[test]
    fn unknown_columns_export_as_empty_cells() {
        let tasks = vec![ContractTask::new("p1", "Insurance certificates")];
        let columns = [Column::new("missing", "Missing")];
        let csv = export_csv(&plain_rows(&tasks), &columns);
        assert_eq!(csv, "\"Missing\"\n\"\"");
    }

    #[test]
    fn file_name_carries_view_and_date() {
        let date = match Date::from_calendar_date(2026, Month::October, 9) {
            Ok(date) => date,
            Err(err) => panic!("fixture date should be valid: {err}"),
        };
        let name = export_file_name("team", date);
        assert_eq!(name, "team_responsibility_2026-10-09.csv");
    }

    proptest! {
        #[test]
        fn property_export_parses_back_to_same_values(
            values in prop::collection::vec("[a-zA-Z0-9 ,\"\r\n]{0,16}", 1..8),
        ) {
            let tasks = values
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    ContractTask::new(format!("p{index}"), value.clone())
                        .with_reference(value.clone(), "1")
                })
                .collect::<Vec<_>>();
            let header = "Page, \"quoted\"";
            let columns = vec![Column::new("page", header), Column::new("task", "Task")];

            let parsed = read_csv(&export_csv(&plain_rows(&tasks), &columns));

            prop_assert_eq!(parsed.len(), tasks.len() + 1);
            prop_assert_eq!(&parsed[0], &vec![header.to_string(), "Task".to_string()]);
            for (row, value) in parsed.iter().skip(1).zip(&values) {
                prop_assert_eq!(row, &vec![value.clone(), value.clone()]);
            }
        }
    }
}
