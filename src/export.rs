use crate::data::{FieldMap, GroupingResult};
use itertools::Itertools;
use log::{debug, info};

pub const UNASSIGNED_LABEL: &str = "Unassigned - no availabilities";

const FIXED_COLUMNS: [&str; 3] = ["Student Name", "Assigned Group", "Assigned Time Slot"];

// filler for a cell the student has no value for
const MISSING_CELL: &str = "0";

/// Labels groups in result order: `Group 1`, `Group 2`, ... for regular
/// groups, the fixed unassigned label otherwise. The unassigned group never
/// takes a number.
pub fn group_labels(result: &GroupingResult) -> Vec<String> {
    let mut next = 1;
    result
        .groups()
        .iter()
        .map(|group| {
            if group.is_unassigned {
                UNASSIGNED_LABEL.to_string()
            } else {
                let label = format!("Group {next}");
                next += 1;
                label
            }
        })
        .collect()
}

/// Rebuilds the roster as CSV with the assignment columns in front.
///
/// The attribute and availability columns are whatever keys the first
/// student of the first group carries. Nothing is exported when that group
/// is empty. Text fields are wrapped in quotes but not escaped.
pub fn export_csv(result: &GroupingResult) -> String {
    let Some(first) = result.first_student() else {
        return String::new();
    };
    let attribute_columns: Vec<&String> = first.attributes.keys().collect();
    let availability_columns: Vec<&String> = first.availabilities.keys().collect();

    let mut header: Vec<&str> = FIXED_COLUMNS.to_vec();
    header.extend(attribute_columns.iter().map(|c| c.as_str()));
    header.extend(availability_columns.iter().map(|c| c.as_str()));

    let mut csv = header.join(",");
    csv.push('\n');

    let mut rows = 0;
    for (group, label) in result.groups().iter().zip(group_labels(result)) {
        let time_slot = group.time_slot.as_deref().unwrap_or_default();
        for student in &group.students {
            let row = [
                quoted(&student.name),
                quoted(&label),
                quoted(time_slot),
            ]
            .into_iter()
            .chain(cells(&student.attributes, &attribute_columns))
            .chain(cells(&student.availabilities, &availability_columns))
            .join(",");
            csv.push_str(&row);
            csv.push('\n');
            rows += 1;
        }
    }

    info!(
        "Exported {} rows with {} attribute and {} availability columns",
        rows,
        attribute_columns.len(),
        availability_columns.len()
    );
    csv
}

fn quoted(text: &str) -> String {
    format!("\"{text}\"")
}

fn cells<'a>(fields: &'a FieldMap, columns: &'a [&'a String]) -> impl Iterator<Item = String> + 'a {
    columns.iter().map(move |column| match fields.get(column.as_str()) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => {
            debug!("no value for column {column}, writing {MISSING_CELL}");
            MISSING_CELL.to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Group, Student};

    fn student(name: &str, attributes: &[(&str, &str)], availabilities: &[(&str, &str)]) -> Student {
        let map = |pairs: &[(&str, &str)]| -> FieldMap {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        Student {
            name: name.to_string(),
            attributes: map(attributes),
            availabilities: map(availabilities),
        }
    }

    fn group(students: Vec<Student>, time_slot: Option<&str>, is_unassigned: bool) -> Group {
        Group {
            students,
            time_slot: time_slot.map(str::to_string),
            is_unassigned,
        }
    }

    #[test]
    fn empty_results_export_nothing() {
        assert_eq!(export_csv(&GroupingResult::Groups { groups: vec![] }), "");
        assert_eq!(
            export_csv(&GroupingResult::Failed {
                error: "infeasible".to_string()
            }),
            ""
        );
        let only_empty = GroupingResult::Groups {
            groups: vec![group(vec![], Some("mon"), false)],
        };
        assert_eq!(export_csv(&only_empty), "");
    }

    #[test]
    fn header_keeps_discovered_columns_in_order() {
        let result = GroupingResult::Groups {
            groups: vec![group(
                vec![student(
                    "Ada",
                    &[("women", "1"), ("finance", "0")],
                    &[("tue 2pm", "1"), ("mon 9am", "0")],
                )],
                Some("tue 2pm"),
                false,
            )],
        };

        let csv = export_csv(&result);
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header.split(',').collect::<Vec<_>>(),
            [
                "Student Name",
                "Assigned Group",
                "Assigned Time Slot",
                "women",
                "finance",
                "tue 2pm",
                "mon 9am"
            ]
        );
        assert_eq!(
            csv,
            "Student Name,Assigned Group,Assigned Time Slot,women,finance,tue 2pm,mon 9am\n\
             \"Ada\",\"Group 1\",\"tue 2pm\",1,0,1,0\n"
        );
    }

    #[test]
    fn unassigned_group_does_not_take_a_number() {
        let result = GroupingResult::Groups {
            groups: vec![
                group(vec![student("A", &[], &[])], Some("mon"), false),
                group(vec![student("U", &[], &[])], None, true),
                group(vec![student("B", &[], &[])], Some("tue"), false),
            ],
        };

        assert_eq!(
            group_labels(&result),
            ["Group 1", UNASSIGNED_LABEL, "Group 2"]
        );
        let csv = export_csv(&result);
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(
            rows,
            [
                "\"A\",\"Group 1\",\"mon\"",
                "\"U\",\"Unassigned - no availabilities\",\"\"",
                "\"B\",\"Group 2\",\"tue\"",
            ]
        );
    }

    #[test]
    fn missing_cells_default_to_zero() {
        let result = GroupingResult::Groups {
            groups: vec![
                group(
                    vec![student("Ada", &[("women", "1")], &[("mon", "1")])],
                    Some("mon"),
                    false,
                ),
                group(
                    vec![student("Bo", &[("finance", "1")], &[("mon", "")])],
                    Some("mon"),
                    false,
                ),
            ],
        };

        let csv = export_csv(&result);
        let bo = csv.lines().nth(2).unwrap();
        assert_eq!(bo, "\"Bo\",\"Group 2\",\"mon\",0,0");
        assert!(csv.ends_with('\n'));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn empty_leading_group_exports_nothing() {
        let result = GroupingResult::Groups {
            groups: vec![
                group(vec![], Some("mon"), false),
                group(vec![student("Cy", &[("tech", "1")], &[])], Some("tue"), false),
            ],
        };
        assert!(result.first_student().is_none());
        assert_eq!(export_csv(&result), "");
    }

    #[test]
    fn columns_ignore_keys_only_later_students_carry() {
        let result = GroupingResult::Groups {
            groups: vec![
                group(vec![student("Ada", &[("women", "1")], &[])], Some("mon"), false),
                group(vec![student("Cy", &[("tech", "1")], &[])], Some("tue"), false),
            ],
        };
        assert_eq!(
            export_csv(&result),
            "Student Name,Assigned Group,Assigned Time Slot,women\n\
             \"Ada\",\"Group 1\",\"mon\",1\n\
             \"Cy\",\"Group 2\",\"tue\",0\n"
        );
    }

    #[test]
    fn text_fields_are_quoted_without_escaping() {
        let result = GroupingResult::Groups {
            groups: vec![group(vec![student("Lee, \"Jo\"", &[], &[])], Some("fri"), false)],
        };
        let row = export_csv(&result).lines().nth(1).unwrap().to_string();
        assert_eq!(row, "\"Lee, \"Jo\"\",\"Group 1\",\"fri\"");
    }
}
