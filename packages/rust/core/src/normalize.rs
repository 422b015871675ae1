//! Canonical form of place names.
//!
//! `"denver co"`, `" Denver,CO "` and `"DENVER, co"` all normalize to
//! `"Denver, CO"`. The lower-cased canonical form is the dedup key.

/// Canonical `"Name, Region"` form of `raw`.
///
/// Splits on the first comma, or on the last whitespace run when there is no
/// comma. Names are title-cased; regions of at most two characters are
/// upper-cased (state codes), longer ones title-cased. Blank input yields an
/// empty string.
pub fn normalize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return String::new();
    }

    let split = match collapsed.split_once(',') {
        Some((name, region)) => Some((name.trim(), region.trim())),
        None => collapsed.rsplit_once(' '),
    };

    match split {
        Some((name, region)) if !name.is_empty() && !region.is_empty() => {
            format!("{}, {}", title_case(name), normalize_region(region))
        }
        Some((name, region)) => title_case(if name.is_empty() { region } else { name }),
        None => title_case(&collapsed),
    }
}

/// Case- and whitespace-insensitive identity of a place name.
///
/// Internal whitespace runs collapse too, so `"Castle  Rock, CO"` and
/// `"Castle Rock, CO"` are the same place.
pub fn dedup_key(raw: &str) -> String {
    normalize(raw).to_lowercase()
}

fn normalize_region(region: &str) -> String {
    if region.chars().count() <= 2 {
        region.to_uppercase()
    } else {
        title_case(region)
    }
}

/// Upper-case a letter that follows a non-letter, lower-case every other one.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_space_without_comma() {
        assert_eq!(normalize("denver co"), "Denver, CO");
        assert_eq!(normalize("colorado springs co"), "Colorado Springs, CO");
    }

    #[test]
    fn splits_on_first_comma() {
        assert_eq!(normalize("castle rock, colorado"), "Castle Rock, Colorado");
        assert_eq!(normalize("  Boulder ,co  "), "Boulder, CO");
    }

    #[test]
    fn single_token_is_title_cased() {
        assert_eq!(normalize("austin"), "Austin");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn letters_after_punctuation_are_capitalized() {
        assert_eq!(normalize("o'fallon, mo"), "O'Fallon, MO");
        assert_eq!(normalize("winston-salem nc"), "Winston-Salem, NC");
    }

    #[test]
    fn empty_side_of_comma_is_dropped() {
        assert_eq!(normalize("austin,"), "Austin");
        assert_eq!(normalize(", tx"), "Tx");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "denver co",
            "castle rock, colorado",
            "austin",
            "Round Rock, TX, USA",
            "st. louis   mo",
            "o'fallon, mo",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn dedup_key_ignores_case_and_spacing() {
        assert_eq!(dedup_key("Denver, CO"), dedup_key(" denver,   co "));
        assert_eq!(dedup_key("DENVER CO"), "denver, co");
        assert_ne!(dedup_key("Denver, CO"), dedup_key("Denver, PA"));
    }

    #[test]
    fn internal_whitespace_runs_collapse() {
        assert_eq!(normalize("Castle  Rock,\tCO"), "Castle Rock, CO");
        assert_eq!(dedup_key("Castle  Rock, CO"), dedup_key("Castle Rock, CO"));
    }
}
