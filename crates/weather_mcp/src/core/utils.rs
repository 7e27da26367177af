use std::fmt::Display;

// Constants for format strings and resource URIs
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
pub const MONTH_FORMAT: &str = "%B";

/// Available resource URIs for the Weather MCP Server
pub const AVAILABLE_RESOURCES: &[&str] = &["weather://status", "weather://help"];

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Render a coordinate pair the way it is shown to users
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{}, {}", latitude, longitude)
}

/// Render an optional value, or "N/A" when the provider omitted it
pub fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// English cardinal words for numbers below one hundred
///
/// # Examples
///
/// `cardinal_words(42)` returns `"forty-two"`.
pub fn cardinal_words(n: u32) -> String {
    match n {
        0..=19 => ONES[n as usize].to_string(),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            match n % 10 {
                0 => tens.to_string(),
                unit => format!("{}-{}", tens, ONES[unit as usize]),
            }
        }
        _ => n.to_string(),
    }
}

/// English ordinal words for numbers below one hundred
///
/// # Examples
///
/// `ordinal_words(21)` returns `"twenty-first"`.
pub fn ordinal_words(n: u32) -> String {
    let cardinal = cardinal_words(n);
    if n >= 100 {
        return numeric_ordinal(n);
    }

    let (head, last) = match cardinal.rsplit_once('-') {
        Some((head, last)) => (format!("{}-", head), last.to_string()),
        None => (String::new(), cardinal),
    };

    let last = match last.as_str() {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        word if word.ends_with('y') => format!("{}ieth", word.trim_end_matches('y')),
        word => format!("{}th", word),
    };

    format!("{}{}", head, last)
}

/// Numeric ordinal such as "3rd" or "11th"
pub fn numeric_ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Spoken 12-hour clock time, e.g. "seven oh five pm"
pub fn clock_words(hour: u32, minute: u32) -> String {
    let period = if hour < 12 { "am" } else { "pm" };
    let hour_12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    let hour_word = cardinal_words(hour_12);

    match minute {
        0 => format!("{} {}", hour_word, period),
        1..=9 => format!("{} oh {} {}", hour_word, cardinal_words(minute), period),
        _ => format!("{} {} {}", hour_word, cardinal_words(minute), period),
    }
}

/// Uppercase the first character of a sentence
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
