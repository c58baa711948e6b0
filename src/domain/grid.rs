// Grid geometry - CSS grid-template-areas model and structural queries
use super::dashboard::{Component, DashboardState};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    pub columns: String,
    pub rows: String,
    pub gap: String,
    pub template_areas: Vec<String>,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: "repeat(3, 1fr)".to_string(),
            rows: "auto 1fr auto".to_string(),
            gap: "1rem".to_string(),
            template_areas: vec![
                "header header header".to_string(),
                "main main sidebar".to_string(),
                "footer footer footer".to_string(),
            ],
        }
    }
}

impl GridLayout {
    /// Trim dimension strings and canonicalize the template rows
    pub fn normalized(self) -> Self {
        Self {
            columns: self.columns.trim().to_string(),
            rows: self.rows.trim().to_string(),
            gap: self.gap.trim().to_string(),
            template_areas: normalize_template_areas(&self.template_areas),
        }
    }

    pub fn area_names(&self) -> Vec<String> {
        extract_grid_areas(&self.template_areas)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStats {
    pub total_areas: usize,
    pub used_areas: usize,
    pub available_areas: usize,
    pub available_area_names: Vec<String>,
}

/// Rows may arrive CSS-quoted, and one string may hold several quoted rows
/// (`"a a" "b c"`). Quoted segments become rows; whitespace is collapsed.
pub fn normalize_template_areas(rows: &[String]) -> Vec<String> {
    let mut normalized = Vec::new();

    for row in rows {
        if row.contains(['"', '\'']) {
            for segment in row.split(['"', '\'']).skip(1).step_by(2) {
                push_collapsed(&mut normalized, segment);
            }
        } else {
            push_collapsed(&mut normalized, row);
        }
    }

    normalized
}

fn push_collapsed(rows: &mut Vec<String>, raw: &str) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        rows.push(collapsed);
    }
}

pub fn is_placeholder(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c == '.')
}

fn is_area_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Distinct area names in first-seen order, placeholders excluded
pub fn extract_grid_areas(template_areas: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut areas = Vec::new();

    for token in template_areas.iter().flat_map(|row| row.split_whitespace()) {
        if !is_placeholder(token) && seen.insert(token) {
            areas.push(token.to_string());
        }
    }

    areas
}

pub fn is_valid_grid_area(area: &str, template_areas: &[String]) -> bool {
    !is_placeholder(area)
        && template_areas
            .iter()
            .flat_map(|row| row.split_whitespace())
            .any(|token| token == area)
}

pub fn area_occupant<'a>(area: &str, state: &'a DashboardState) -> Option<&'a Component> {
    state.components.values().find(|c| c.grid_area == area)
}

pub fn is_grid_area_occupied(area: &str, state: &DashboardState) -> bool {
    area_occupant(area, state).is_some()
}

pub fn validate_grid_layout(candidate: &GridLayout) -> GridValidation {
    let mut errors = Vec::new();

    for (field, value) in [
        ("columns", &candidate.columns),
        ("rows", &candidate.rows),
        ("gap", &candidate.gap),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("{} must be a non-empty dimension string", field));
        }
    }

    if candidate.template_areas.is_empty() {
        errors.push("templateAreas must contain at least one row".to_string());
        return GridValidation { valid: false, errors };
    }

    let cells: Vec<Vec<&str>> = candidate
        .template_areas
        .iter()
        .map(|row| row.split_whitespace().collect())
        .collect();

    let width = cells[0].len();
    let mut ragged = false;
    for (index, row) in cells.iter().enumerate() {
        if row.is_empty() {
            errors.push(format!("row {} of templateAreas is empty", index + 1));
            ragged = true;
        } else if row.len() != width {
            errors.push(format!(
                "row {} has {} cells but row 1 has {}; every row needs the same number of cells",
                index + 1,
                row.len(),
                width
            ));
            ragged = true;
        }
    }

    let mut reported = HashSet::new();
    for (index, row) in cells.iter().enumerate() {
        for token in row {
            if !is_placeholder(token) && !is_area_identifier(token) && reported.insert(*token) {
                errors.push(format!(
                    "invalid area name '{}' in row {}",
                    token,
                    index + 1
                ));
            }
        }
    }

    // Rectangle check only makes sense on a well-formed matrix
    if !ragged {
        errors.extend(non_rectangular_areas(&cells));
    }

    GridValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// An area's cells fill their bounding box exactly when the counts agree,
/// since each cell holds a single name.
fn non_rectangular_areas(cells: &[Vec<&str>]) -> Vec<String> {
    let mut order = Vec::new();
    let mut positions: HashMap<&str, Vec<(usize, usize)>> = HashMap::new();

    for (r, row) in cells.iter().enumerate() {
        for (c, token) in row.iter().enumerate() {
            if is_placeholder(token) {
                continue;
            }
            positions
                .entry(*token)
                .or_insert_with(|| {
                    order.push(*token);
                    Vec::new()
                })
                .push((r, c));
        }
    }

    order
        .into_iter()
        .filter_map(|name| {
            let cells = &positions[&name];
            let (min_r, max_r) = bounds(cells.iter().map(|(r, _)| *r));
            let (min_c, max_c) = bounds(cells.iter().map(|(_, c)| *c));
            let expected = (max_r - min_r + 1) * (max_c - min_c + 1);

            (cells.len() != expected).then(|| {
                format!(
                    "area '{}' does not form a single rectangular block",
                    name
                )
            })
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = usize>) -> (usize, usize) {
    values.fold((usize::MAX, 0), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

pub fn get_grid_stats(state: &DashboardState) -> GridStats {
    let areas = state.grid.area_names();
    let available_area_names: Vec<String> = areas
        .iter()
        .filter(|area| !is_grid_area_occupied(area, state))
        .cloned()
        .collect();

    GridStats {
        total_areas: areas.len(),
        used_areas: areas.len() - available_area_names.len(),
        available_areas: available_area_names.len(),
        available_area_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::{Component, ComponentType};

    fn layout(rows: &[&str]) -> GridLayout {
        GridLayout {
            columns: "1fr 1fr".to_string(),
            rows: "auto".to_string(),
            gap: "8px".to_string(),
            template_areas: rows.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_extract_grid_areas_dedups_and_skips_placeholders() {
        let rows = vec!["header header".to_string(), ". main".to_string(), "footer main".to_string()];
        assert_eq!(extract_grid_areas(&rows), vec!["header", "main", "footer"]);
    }

    #[test]
    fn test_is_valid_grid_area() {
        let rows = vec!["header header".to_string(), "sidebar .".to_string()];
        assert!(is_valid_grid_area("sidebar", &rows));
        assert!(!is_valid_grid_area(".", &rows));
        assert!(!is_valid_grid_area("main", &rows));
    }

    #[test]
    fn test_validate_accepts_rectangular_layout() {
        let result = validate_grid_layout(&layout(&["header header", "sidebar main", "sidebar main"]));
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_validate_rejects_ragged_rows() {
        let result = validate_grid_layout(&layout(&["header header", "sidebar main extra"]));
        assert!(!result.valid);
        assert!(result.errors[0].contains("row 2 has 3 cells"));
    }

    #[test]
    fn test_validate_rejects_disconnected_and_l_shaped_areas() {
        let split = validate_grid_layout(&layout(&["a b a"]));
        assert!(!split.valid);
        assert!(split.errors.iter().any(|e| e.contains("'a'")));

        let l_shape = validate_grid_layout(&layout(&["a a", "a b"]));
        assert!(!l_shape.valid);
    }

    #[test]
    fn test_validate_rejects_blank_dimensions_and_bad_names() {
        let mut candidate = layout(&["1st ok"]);
        candidate.gap = "  ".to_string();
        let result = validate_grid_layout(&candidate);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.starts_with("gap")));
        assert!(result.errors.iter().any(|e| e.contains("'1st'")));

        let empty = validate_grid_layout(&layout(&[]));
        assert!(!empty.valid);
    }

    #[test]
    fn test_normalize_template_areas() {
        let rows = vec![
            "\"header   header\" \"nav main\"".to_string(),
            "  footer\tfooter ".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(
            normalize_template_areas(&rows),
            vec!["header header", "nav main", "footer footer"]
        );
    }

    #[test]
    fn test_grid_stats() {
        let mut state = DashboardState::default();
        state.grid = layout(&["header header", "sidebar main"]);
        state.components.insert(
            "c1".to_string(),
            Component::new("c1".to_string(), ComponentType::Table, "main".to_string(), "Orders".to_string()),
        );

        let stats = get_grid_stats(&state);
        assert_eq!(stats.total_areas, 3);
        assert_eq!(stats.used_areas, 1);
        assert_eq!(stats.available_areas, 2);
        assert_eq!(stats.available_area_names, vec!["header", "sidebar"]);
        assert!(is_grid_area_occupied("main", &state));
    }
}
