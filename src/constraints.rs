use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, trace};
use serde::Serialize;

/// Which end of a range a raw value is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Min,
    Max,
}

/// The four group-level numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupField {
    SizeMin,
    SizeMax,
    CountMin,
    CountMax,
}

impl GroupField {
    pub const ALL: [GroupField; 4] = [
        GroupField::SizeMin,
        GroupField::SizeMax,
        GroupField::CountMin,
        GroupField::CountMax,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            GroupField::SizeMin => "group_size_min",
            GroupField::SizeMax => "group_size_max",
            GroupField::CountMin => "group_count_min",
            GroupField::CountMax => "group_count_max",
        }
    }

    fn index(self) -> usize {
        match self {
            GroupField::SizeMin => 0,
            GroupField::SizeMax => 1,
            GroupField::CountMin => 2,
            GroupField::CountMax => 3,
        }
    }
}

/// Where the user is in the two-step form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attributes,
    Constraints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_per_group: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_per_group: Option<u32>,
}

/// A quota on how many students having any of `attributes` land in each group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedConstraint {
    pub attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

/// The normalized constraint payload. Every `None` means "unconstrained" and
/// never reaches the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSpec {
    pub given_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_count_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_count_max: Option<u32>,
    pub attribute_constraints: IndexMap<String, AttributeBounds>,
    pub combined_constraints: Vec<CombinedConstraint>,
}

impl ConstraintSpec {
    pub fn group_field(&self, field: GroupField) -> Option<u32> {
        match field {
            GroupField::SizeMin => self.group_size_min,
            GroupField::SizeMax => self.group_size_max,
            GroupField::CountMin => self.group_count_min,
            GroupField::CountMax => self.group_count_max,
        }
    }

    /// The text fields of the upload form, in send order. The file part is
    /// added by the transport.
    pub fn form_fields(&self) -> serde_json::Result<Vec<(String, String)>> {
        let mut fields = vec![(
            "given_attributes".to_string(),
            self.given_attributes.iter().join(","),
        )];

        for field in GroupField::ALL {
            if let Some(value) = self.group_field(field) {
                fields.push((field.wire_name().to_string(), value.to_string()));
            }
        }

        for (attribute, bounds) in &self.attribute_constraints {
            if let Some(min) = bounds.min_per_group {
                fields.push((format!("{attribute}_min_per_group"), min.to_string()));
            }
            if let Some(max) = bounds.max_per_group {
                fields.push((format!("{attribute}_max_per_group"), max.to_string()));
            }
        }

        if !self.combined_constraints.is_empty() {
            fields.push((
                "combined_constraints".to_string(),
                serde_json::to_string(&self.combined_constraints)?,
            ));
        }

        Ok(fields)
    }
}

/// Splits the comma-separated attribute list: trimmed, in entry order, no
/// blanks and no repeats.
pub fn split_attributes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|attr| !attr.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default)]
struct RawBounds {
    min: String,
    max: String,
}

impl RawBounds {
    fn set(&mut self, bound: Bound, raw: &str) {
        match bound {
            Bound::Min => self.min = raw.to_string(),
            Bound::Max => self.max = raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RawCombined {
    attributes: Vec<String>,
    bounds: RawBounds,
}

/// Collects raw form text and turns it into a [`ConstraintSpec`].
///
/// Raw text is stored exactly as typed; parsing happens only in
/// [`ConstraintBuilder::build`], and anything blank or unparseable is left
/// out of the spec rather than reported.
#[derive(Debug, Clone)]
pub struct ConstraintBuilder {
    attribute_text: String,
    given_attributes: Vec<String>,
    stage: Stage,
    group_fields: [String; 4],
    attribute_bounds: IndexMap<String, RawBounds>,
    combined: Vec<RawCombined>,
}

impl Default for ConstraintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintBuilder {
    pub fn new() -> Self {
        Self {
            attribute_text: String::new(),
            given_attributes: Vec::new(),
            stage: Stage::Attributes,
            group_fields: Default::default(),
            attribute_bounds: IndexMap::new(),
            combined: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn attribute_text(&self) -> &str {
        &self.attribute_text
    }

    pub fn set_attribute_text(&mut self, raw: &str) {
        self.attribute_text = raw.to_string();
    }

    /// Ends step one: splits the attribute text and moves on to the numeric
    /// fields.
    pub fn confirm_attributes(&mut self) -> &[String] {
        self.given_attributes = split_attributes(&self.attribute_text);
        self.stage = Stage::Constraints;
        trace!("confirmed attributes {:?}", self.given_attributes);
        &self.given_attributes
    }

    /// Back to step one. Everything typed in step two is kept.
    pub fn back_to_attributes(&mut self) {
        self.stage = Stage::Attributes;
    }

    pub fn given_attributes(&self) -> &[String] {
        &self.given_attributes
    }

    pub fn set_group_field(&mut self, field: GroupField, raw: &str) {
        self.group_fields[field.index()] = raw.to_string();
    }

    pub fn set_attribute_bound(&mut self, attribute: &str, bound: Bound, raw: &str) {
        self.attribute_bounds
            .entry(attribute.to_string())
            .or_default()
            .set(bound, raw);
    }

    /// Adds an empty combined constraint row and returns its index.
    pub fn add_combined(&mut self) -> usize {
        self.combined.push(RawCombined::default());
        self.combined.len() - 1
    }

    pub fn remove_combined(&mut self, index: usize) {
        if index < self.combined.len() {
            self.combined.remove(index);
        }
    }

    pub fn combined_len(&self) -> usize {
        self.combined.len()
    }

    /// Ticks or unticks one attribute of a combined row.
    pub fn set_combined_attribute(&mut self, index: usize, attribute: &str, checked: bool) {
        let Some(row) = self.combined.get_mut(index) else {
            debug!("no combined constraint row {index}");
            return;
        };
        let present = row.attributes.iter().any(|a| a == attribute);
        if checked && !present {
            row.attributes.push(attribute.to_string());
        } else if !checked {
            row.attributes.retain(|a| a != attribute);
        }
    }

    pub fn set_combined_bound(&mut self, index: usize, bound: Bound, raw: &str) {
        match self.combined.get_mut(index) {
            Some(row) => row.bounds.set(bound, raw),
            None => debug!("no combined constraint row {index}"),
        }
    }

    /// Normalizes the current form state. Does not touch the raw text.
    pub fn build(&self) -> ConstraintSpec {
        let given = &self.given_attributes;

        // only attributes still in the list count; entries for removed ones
        // are stale form state
        let attribute_constraints: IndexMap<String, AttributeBounds> = given
            .iter()
            .filter_map(|attr| {
                let raw = self.attribute_bounds.get(attr)?;
                let bounds = AttributeBounds {
                    min_per_group: parse_count(&raw.min),
                    max_per_group: parse_count(&raw.max),
                };
                (bounds.min_per_group.is_some() || bounds.max_per_group.is_some())
                    .then(|| (attr.clone(), bounds))
            })
            .collect();

        let combined_constraints: Vec<CombinedConstraint> = self
            .combined
            .iter()
            .filter_map(|row| {
                let attributes: Vec<String> = row
                    .attributes
                    .iter()
                    .filter(|a| given.contains(a))
                    .cloned()
                    .collect();
                let min = parse_count(&row.bounds.min);
                let max = parse_count(&row.bounds.max);
                (!attributes.is_empty() && (min.is_some() || max.is_some()))
                    .then_some(CombinedConstraint { attributes, min, max })
            })
            .collect();

        let spec = ConstraintSpec {
            given_attributes: given.clone(),
            group_size_min: self.group_value(GroupField::SizeMin),
            group_size_max: self.group_value(GroupField::SizeMax),
            group_count_min: self.group_value(GroupField::CountMin),
            group_count_max: self.group_value(GroupField::CountMax),
            attribute_constraints,
            combined_constraints,
        };
        debug!(
            "built constraint spec {}",
            serde_json::to_string(&spec).unwrap_or_default()
        );
        spec
    }

    fn group_value(&self, field: GroupField) -> Option<u32> {
        parse_count(&self.group_fields[field.index()]).filter(|&n| n > 0)
    }
}

// blank or garbage -> None
fn parse_count(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            debug!("ignoring non-numeric bound {raw:?}");
            None
        }
    }
}
