use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn wholesale_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:pack|packs|bulk|wholesale|case|box|lot)\b|\b\d+[-\s]?packs?\b|\b\d+\s*(?:pc|pcs|piece|pieces|ct|count)\b",
        )
        .expect("static regex")
    })
}

/// True when the title reads like a multi-unit or bulk listing.
pub fn is_wholesale(title: &str) -> bool {
    wholesale_re().is_match(title)
}

fn dollar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\d+[\d.,]*\s*").expect("static regex"))
}

fn edge_separators_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\s\-–—]+|[\s\-–—]+$").expect("static regex"))
}

fn multi_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("static regex"))
}

pub fn has_dollar_amount(title: &str) -> bool {
    dollar_re().is_match(title)
}

/// Drop `$12.99`-style amounts and the separators they leave dangling.
pub fn clean_dollar_from_title(title: &str) -> String {
    let removed = dollar_re().replace_all(title, "");
    let trimmed = edge_separators_re().replace_all(removed.trim(), "");
    multi_space_re().replace_all(&trimmed, " ").into_owned()
}

/// Protected names mapped to neutral descriptive stand-ins.
const TRADEMARK_REPLACEMENTS: &[(&str, &str)] = &[
    // characters
    ("scooby-doo", "Mystery Hound"),
    ("scooby doo", "Mystery Hound"),
    ("rick and morty", "Dimension Hopper"),
    ("rick", "Mad Scientist"),
    ("morty", "Sidekick Kid"),
    ("homer", "Yellow Dad"),
    ("marge", "Blue Hair Mom"),
    ("bart", "Skateboard Kid"),
    ("simpsons", "Yellow Family"),
    ("mario", "Plumber Hero"),
    ("luigi", "Green Plumber"),
    ("sonic", "Speed Hedgehog"),
    ("pokemon", "Pocket Creature"),
    ("pikachu", "Electric Mouse"),
    ("gastly", "Ghost Spirit"),
    ("spongebob", "Sea Sponge"),
    ("patrick", "Starfish Friend"),
    ("ninja turtle", "Shell Warrior"),
    ("tmnt", "Shell Warrior"),
    ("mickey", "Classic Mouse"),
    ("minnie", "Bow Mouse"),
    ("disney", "Classic Animation"),
    ("shrek", "Green Ogre"),
    ("donkey", "Talking Donkey"),
    ("kuromi", "Dark Rabbit"),
    ("kitty", "Bow Cat"),
    ("kenny", "Hooded Kid"),
    ("labubu", "Forest Sprite"),
    ("peter docter", "Emotion Guide"),
    ("sadness", "Blue Feeling"),
    // athletes
    ("lionel messi", "Soccer Legend"),
    ("messi", "GOAT Player"),
    ("ronaldo", "Football Star"),
    ("neymar", "Brazilian Striker"),
    ("lebron", "Basketball King"),
    ("jordan", "Air Legend"),
    ("kobe", "Mamba Legend"),
    // public figures
    ("modi", "World Leader"),
    ("trump", "Tower Man"),
    ("biden", "Aviator Joe"),
    ("obama", "Hope Man"),
    // brands
    ("nike", "Swoosh Style"),
    ("adidas", "Three Stripe"),
    ("supreme", "Box Logo"),
    ("gucci", "Double G"),
    ("louis vuitton", "LV Style"),
    ("chanel", "Double C"),
    ("versace", "Medusa Head"),
    // film and comics
    ("star wars", "Galaxy Battle"),
    ("yoda", "Wise Master"),
    ("darth vader", "Dark Lord"),
    ("harry potter", "Wizard Boy"),
    ("batman", "Dark Knight"),
    ("superman", "Caped Hero"),
    ("alien spider-man", "Alien Web Slinger"),
    ("spiderman", "Web Slinger"),
    ("spider-man", "Web Slinger"),
    ("hulk", "Green Giant"),
    ("iron man", "Metal Hero"),
    ("captain america", "Shield Hero"),
    ("thanos", "Infinity Titan"),
    ("groot", "Tree Friend"),
    ("deadpool", "Merc Mouth"),
];

struct TrademarkTable {
    re: Regex,
    lookup: HashMap<&'static str, String>,
}

fn trademark_table() -> &'static TrademarkTable {
    static TABLE: OnceLock<TrademarkTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut keys: Vec<&str> = TRADEMARK_REPLACEMENTS.iter().map(|(k, _)| *k).collect();
        // Longest first so "rick and morty" wins over "rick".
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let re = Regex::new(&format!(r"\b(?:{alternation})\b")).expect("static regex");
        let lookup = TRADEMARK_REPLACEMENTS
            .iter()
            .map(|(k, v)| (*k, v.to_lowercase()))
            .collect();
        TrademarkTable { re, lookup }
    })
}

const SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
];

/// Capitalize each word except small joining words after the first.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                capitalize(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replace protected names (whole words only) and title-case the result.
pub fn sanitize_title(original: &str) -> String {
    let table = trademark_table();
    let lowered = original.to_lowercase();
    let replaced = table.re.replace_all(&lowered, |caps: &regex::Captures| {
        table
            .lookup
            .get(&caps[0])
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    });
    title_case(replaced.trim())
}

fn size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\d+(?:\.\d+)?)['’"”″]\s*"#).expect("static regex"))
}

fn leading_size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\d+(?:\.\d+)?['’"”″]+\s*"#).expect("static regex"))
}

fn leading_quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^["“”]\s*"#).expect("static regex"))
}

/// Title-facing material names found in a spec string.
pub fn title_materials(specs: &str) -> Vec<&'static str> {
    let lower = specs.to_lowercase();
    [("glass", "Glass"), ("silicone", "Silicone"), ("pvc", "PVC")]
        .into_iter()
        .filter(|(needle, _)| lower.contains(needle))
        .map(|(_, label)| label)
        .collect()
}

/// `[size"] <sanitized name> [| Material + Material]`.
pub fn creative_title(name: &str, specs: &str) -> String {
    let size = size_re()
        .captures(name)
        .map(|c| format!("{}\"", &c[1]));

    let sanitized = sanitize_title(name);
    let base = leading_size_re().replace(&sanitized, "");
    let base = leading_quote_re().replace(&base, "").into_owned();

    let mut parts: Vec<String> = Vec::new();
    if let Some(size) = size {
        parts.push(size);
    }
    parts.push(base.clone());
    let materials = title_materials(specs);
    if !materials.is_empty() {
        let joined = materials.join(" + ");
        if !base.to_lowercase().contains(&joined.to_lowercase()) {
            parts.push(format!("| {joined}"));
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wholesale_titles() {
        for title in [
            "Rolling Papers 24 Pack",
            "Hemp Wick BULK",
            "Lighter Display Box",
            "Mini Jars 50pcs",
            "Grinder 12-pack",
            "Filter Tips 100 ct",
            "Wholesale Glass Lot",
        ] {
            assert!(is_wholesale(title), "{title}");
        }
        for title in ["Backpack Grinder", "Boxer Ashtray", "Packwoods Tray", "Frog Water Pipe"] {
            assert!(!is_wholesale(title), "{title}");
        }
    }

    #[test]
    fn cleans_dollar_amounts_and_dangling_separators() {
        assert_eq!(clean_dollar_from_title("$9.99 - Glass Bowl"), "Glass Bowl");
        assert_eq!(clean_dollar_from_title("Glass Bowl – $1,299.00"), "Glass Bowl");
        assert_eq!(clean_dollar_from_title("Bowl $5 Special  Edition"), "Bowl Special Edition");
        assert_eq!(clean_dollar_from_title("No price here"), "No price here");
        assert!(has_dollar_amount("$5 Bowl"));
        assert!(!has_dollar_amount("5 Bowl"));
    }

    #[test]
    fn sanitizes_whole_words_longest_first() {
        assert_eq!(sanitize_title("Rick and Morty Water Pipe"), "Dimension Hopper Water Pipe");
        assert_eq!(sanitize_title("Alien Spider-Man Hand Pipe"), "Alien Web Slinger Hand Pipe");
        assert_eq!(sanitize_title("Brick Ashtray"), "Brick Ashtray");
        assert_eq!(sanitize_title("Kitty with a Bow"), "Bow Cat with a Bow");
    }

    #[test]
    fn title_case_keeps_small_words_lower() {
        assert_eq!(title_case("the cat in THE hat"), "The Cat in the Hat");
        assert_eq!(title_case("  "), "");
    }

    #[test]
    fn creative_title_moves_size_and_adds_materials() {
        assert_eq!(
            creative_title("12\" Frog Water Pipe", "Glass 230*106*124mm"),
            "12\" Frog Water Pipe | Glass"
        );
        assert_eq!(
            creative_title("Shark Hand Pipe", "Glass+Silicone"),
            "Shark Hand Pipe | Glass + Silicone"
        );
        assert_eq!(creative_title("Silicone Bowl", "silicone"), "Silicone Bowl");
        assert_eq!(creative_title("Mario Bubbler", ""), "Plumber Hero Bubbler");
    }
}
