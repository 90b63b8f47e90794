use unicode_normalization::UnicodeNormalization;

/// Turn a display string into an id fragment: accents stripped, lowercase,
/// only `[a-z0-9-]` kept, whitespace runs become a single hyphen.
pub fn slugify(text: &str) -> String {
    let decomposed: String = text
        .nfkd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect();
    let lowered = decomposed.trim().to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for c in lowered.chars() {
        match c {
            'a'..='z' | '0'..='9' | '-' => {
                if pending_space {
                    push_hyphen(&mut slug);
                    pending_space = false;
                }
                if c == '-' {
                    push_hyphen(&mut slug);
                } else {
                    slug.push(c);
                }
            }
            ' ' => pending_space = true,
            _ => {}
        }
    }
    if pending_space {
        push_hyphen(&mut slug);
    }
    slug
}

fn push_hyphen(slug: &mut String) {
    if !slug.ends_with('-') {
        slug.push('-');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Route 1"), "route-1");
        assert_eq!(slugify("  Pokémon Center  "), "pokemon-center");
        assert_eq!(slugify("Surf, Dark Spot"), "surf-dark-spot");
        assert_eq!(slugify("Route 2 - North"), "route-2-north");
        assert_eq!(slugify("Mr. Mime!"), "mr-mime");
    }

    #[test]
    fn test_trailing_removed_chars_keep_hyphen() {
        // Trimming happens before punctuation is dropped.
        assert_eq!(slugify("Route 1 !"), "route-1-");
    }
}
