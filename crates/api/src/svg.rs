//! Deterministic SVG scene used by the caching demo.

use std::fmt::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const CANVAS: u32 = 1000;
pub const POLYGONS: usize = 500;
pub const LABELS: usize = 500;

const SEED: u64 = 42;
const WORDS: [&str; 8] = ["Rust", "Tokio", "Redis", "Axum", "Docker", "Cache", "Fast", "Async"];

fn color(rng: &mut StdRng) -> String {
    format!(
        "#{:02x}{:02x}{:02x}",
        rng.gen_range(0..=255u8),
        rng.gen_range(0..=255u8),
        rng.gen_range(0..=255u8)
    )
}

/// Render 500 random polygons and 500 text labels.
///
/// The generator is seeded, so every call returns the same document.
pub fn generate() -> String {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut out = String::with_capacity(128 * (POLYGONS + LABELS));

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{CANVAS}\" height=\"{CANVAS}\" viewBox=\"0 0 {CANVAS} {CANVAS}\">"
    );

    for _ in 0..POLYGONS {
        let x: i32 = rng.gen_range(0..=950);
        let y: i32 = rng.gen_range(0..=950);
        let corners = rng.gen_range(3..=6);
        let points: Vec<String> = (0..corners)
            .map(|_| {
                let px = x + rng.gen_range(-50..=50);
                let py = y + rng.gen_range(-50..=50);
                format!("{px},{py}")
            })
            .collect();
        let fill = color(&mut rng);
        let opacity: f64 = rng.gen_range(0.3..0.9);
        let _ = writeln!(
            out,
            "<polygon points=\"{}\" fill=\"{fill}\" opacity=\"{opacity:.2}\" stroke=\"black\" stroke-width=\"0.5\"/>",
            points.join(" ")
        );
    }

    for _ in 0..LABELS {
        let x: u32 = rng.gen_range(10..=950);
        let y: u32 = rng.gen_range(20..=980);
        let size: u32 = rng.gen_range(8..=24);
        let fill = color(&mut rng);
        let word = WORDS[rng.gen_range(0..WORDS.len())];
        let _ = writeln!(
            out,
            "<text x=\"{x}\" y=\"{y}\" font-size=\"{size}\" fill=\"{fill}\" opacity=\"0.7\">{word}</text>"
        );
    }

    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_deterministic() {
        assert_eq!(generate(), generate());
    }

    #[test]
    fn document_has_expected_element_counts() {
        let svg = generate();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<polygon ").count(), POLYGONS);
        assert_eq!(svg.matches("<text ").count(), LABELS);
    }
}
