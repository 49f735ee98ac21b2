//! Quality-ordered parsing for `Accept`, `Accept-Language` and `Accept-Charset`.

/// Step subtracted from the synthetic quality of each successive entry without a `q` parameter.
const SYNTHETIC_STEP: f32 = 0.01;

/// One entry of a negotiation header together with the quality used to order it.
#[derive(Clone, Debug, PartialEq)]
pub struct Preference {
    pub value: String,
    pub quality: f32,
}

/// Parses a negotiation header into entries ordered from most to least preferred.
///
/// Entries without an explicit quality receive `1.0 - 0.01 * index` so that declaration order
/// survives among them. Explicit qualities are clamped to `[0, 1]`; unparseable ones count as
/// `0`. Zero-quality entries are kept at the end rather than dropped.
pub fn parse_preferences(header: Option<&str>) -> Vec<Preference> {
    let Some(header) = header else {
        return Vec::new();
    };

    let mut entries = header
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(index, entry)| parse_entry(index, entry))
        .collect::<Vec<_>>();

    // `sort_by` is stable, so equal qualities keep their declaration order.
    entries.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    entries
}

/// Same as [`parse_preferences`] but keeps only the values.
pub fn parse_negotiation(header: Option<&str>) -> Vec<String> {
    parse_preferences(header)
        .into_iter()
        .map(|preference| preference.value)
        .collect()
}

fn parse_entry(index: usize, entry: &str) -> Preference {
    let mut parts = entry.split(';');
    let value = parts.next().unwrap_or_default().trim().to_string();

    let explicit = parts.find_map(|param| {
        let (name, raw) = param.split_once('=')?;
        name.trim().eq_ignore_ascii_case("q").then(|| raw.trim())
    });

    let quality = match explicit {
        Some(raw) => match raw.parse::<f32>() {
            Ok(q) if q.is_nan() => 0.0,
            Ok(q) => q.clamp(0.0, 1.0),
            Err(_) => {
                log::debug!("unparseable quality {raw:?} for {value:?}; treating as 0");
                0.0
            }
        },
        None => (1.0 - SYNTHETIC_STEP * index as f32).max(0.0),
    };

    Preference { value, quality }
}

/// Splits `Accept-Encoding` in declaration order; qualities are not interpreted.
pub fn parse_encodings(header: Option<&str>) -> Vec<String> {
    header
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
