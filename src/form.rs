use crate::source::WireSource;
use std::collections::HashMap;

/// Upper bound (exclusive) of the indexed field suffixes accepted per request.
pub const MAX_CURRENTS_AMOUNT: usize = 100;

/// Reads `current{i}`, `x_position{i}`, `y_position{i}` triples for
/// `i = 1, 2, ...` until the first index where any of the three is missing
/// or not a number. Later indices are ignored even when present.
pub fn parse_sources(form: &HashMap<String, String>) -> Vec<WireSource> {
    let mut sources = Vec::new();

    for i in 1..MAX_CURRENTS_AMOUNT {
        let current = parse_field(form, "current", i);
        let x = parse_field(form, "x_position", i);
        let y = parse_field(form, "y_position", i);

        match (current, x, y) {
            (Some(current), Some(x), Some(y)) => sources.push(WireSource::new(current, x, y)),
            _ => break,
        }
    }

    sources
}

/// Collapses repeated keys to their first submitted value.
pub fn first_values(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut form = HashMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        form.entry(key).or_insert(value);
    }
    form
}

fn parse_field(form: &HashMap<String, String>, name: &str, index: usize) -> Option<f64> {
    form.get(&format!("{}{}", name, index))
        .and_then(|raw| raw.trim().parse::<f64>().ok())
}
