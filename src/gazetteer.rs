//! Tyumen-region locality gazetteer (spec.md §4.3), grounded on
//! `parser.py::extract_location`. Tyumen-specific by design (spec.md
//! Non-goals: no cross-region generalization).

use once_cell::sync::Lazy;
use regex::Regex;

/// Fixed dictionary of known Tyumen-region localities, scanned in order;
/// first case-insensitive hit wins. Order matches the original Python
/// list verbatim.
pub static LOCALITIES: &[&str] = &[
    "Тюмень",
    "Тобольск",
    "Ишим",
    "Ялуторовск",
    "Заводоуковск",
    "Голышманово",
    "Вагай",
    "Упорово",
    "Омутинское",
    "Армизонское",
    "Бердюжье",
    "Абатское",
    "Викулово",
    "Сорокино",
    "Юргинское",
    "Нижняя Тавда",
    "Ярково",
    "Казанское",
    "Исетское",
    "Сладково",
];

/// Latitude/longitude table for the subset of localities the map-data
/// external interface (spec.md §6 `get_map_data`) needs to render pins.
/// Presentation concern per the Glossary, but the coordinates are
/// Tyumen-specific static data that belongs next to the locality list.
pub fn coordinates_for(location: &str) -> Option<(f64, f64)> {
    let table: &[(&str, f64, f64)] = &[
        ("Тюмень", 57.1522, 65.5272),
        ("Тобольск", 58.1999, 68.2535),
        ("Ишим", 56.1104, 69.4865),
        ("Ялуторовск", 56.6519, 66.3016),
        ("Заводоуковск", 56.4978, 66.5522),
        ("Голышманово", 56.3985, 68.3858),
        ("Вагай", 57.9386, 69.0994),
        ("Упорово", 56.2980, 66.3380),
        ("Омутинское", 56.3236, 68.0078),
        ("Армизонское", 55.9386, 67.2972),
        ("Бердюжье", 55.7814, 68.8394),
        ("Абатское", 56.2814, 70.4567),
        ("Викулово", 56.8167, 70.6167),
        ("Сорокино", 56.2167, 71.1167),
        ("Юргинское", 56.8736, 66.9686),
        ("Нижняя Тавда", 57.6464, 66.1467),
        ("Ярково", 57.3900, 67.2800),
        ("Казанское", 55.3667, 69.2333),
        ("Исетское", 56.5006, 65.3250),
        ("Сладково", 55.5208, 70.2878),
    ];
    table
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(location))
        .map(|(_, lat, lng)| (*lat, *lng))
}

static DISTRICT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(\w+)\s*район").unwrap(),
        Regex::new(r"(?i)(\w+)\s*округ").unwrap(),
        Regex::new(r"(?i)(\w+)\s*муниципалитет").unwrap(),
    ]
});

/// Extract a locality name from free text: known-locality scan first,
/// then a `(\w+) район|округ|муниципалитет` fallback, `None` otherwise.
pub fn extract_location(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    for &loc in LOCALITIES {
        if lower.contains(&loc.to_lowercase()) {
            return Some(loc.to_string());
        }
    }
    for pattern in DISTRICT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_locality() {
        assert_eq!(
            extract_location("В Тюмени зарегистрировано 73 обращения"),
            Some("Тюмень".to_string())
        );
    }

    #[test]
    fn falls_back_to_district_pattern() {
        assert_eq!(
            extract_location("случаи зафиксированы в Нагорном районе"),
            Some("Нагорном".to_string())
        );
    }

    #[test]
    fn none_when_nothing_matches() {
        assert_eq!(extract_location("обычный текст без локации"), None);
    }

    #[test]
    fn coordinates_lookup_known() {
        assert!(coordinates_for("Тюмень").is_some());
        assert!(coordinates_for("Неизвестный").is_none());
    }
}
