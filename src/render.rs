use crate::data::{GroupingResult, Student};
use itertools::Itertools;
use std::fmt::{self, Write};

/// Plain-text view of a result for the terminal.
pub fn render_summary(result: &GroupingResult) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_summary(&mut out, result);
    out
}

fn write_summary(out: &mut String, result: &GroupingResult) -> fmt::Result {
    if let Some(error) = result.error() {
        return writeln!(out, "No groups data\n{error}");
    }

    let regular: Vec<_> = result.regular_groups().collect();
    writeln!(out, "Created {} groups with your constraints", regular.len())?;

    let unassigned = result.unassigned().filter(|g| !g.students.is_empty());
    if let Some(group) = unassigned {
        writeln!(
            out,
            "Note: {} student(s) could not be assigned to groups because they have no available time slots: {}",
            group.students.len(),
            group.students.iter().map(|s| s.name.as_str()).join(", ")
        )?;
    }

    for (index, group) in regular.iter().enumerate() {
        writeln!(out)?;
        match group.time_slot.as_deref() {
            Some(slot) if !slot.is_empty() => writeln!(out, "Group {} [{}]", index + 1, slot)?,
            _ => writeln!(out, "Group {}", index + 1)?,
        }
        write_students(out, &group.students)?;
    }

    if let Some(group) = unassigned {
        writeln!(out)?;
        writeln!(out, "Unassigned - No Availabilities")?;
        write_students(out, &group.students)?;
    }
    Ok(())
}

fn write_students(out: &mut String, students: &[Student]) -> fmt::Result {
    for student in students {
        if student.attributes.is_empty() {
            writeln!(out, "  {}", student.name)?;
        } else {
            let attributes = student
                .attributes
                .iter()
                .map(|(attr, value)| format!("{attr}: {value}"))
                .join(" | ");
            writeln!(out, "  {}  ({})", student.name, attributes)?;
        }
    }
    Ok(())
}
