/// Cell styles for eyeballing suspicious values in a rendered table.
///
/// Each function returns one CSS declaration per cell, empty for cells that
/// need no highlight. `highlight_zero` uses this color.
pub const DEFAULT_HIGHLIGHT: &str = "yellow";

fn background(color: &str) -> String {
    format!("background-color: {}", color)
}

/// Highlights cells equal to zero in yellow.
pub fn highlight_zero(values: &[f64]) -> Vec<String> {
    values
        .iter()
        .map(|v| if *v == 0.0 { background(DEFAULT_HIGHLIGHT) } else { String::new() })
        .collect()
}

/// Highlights the cells where `mask` is true.
pub fn highlight_where(mask: &[bool], color: &str) -> Vec<String> {
    mask.iter()
        .map(|hit| if *hit { background(color) } else { String::new() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_zero() {
        let styles = highlight_zero(&[0.0, 12.5, -0.0]);
        assert_eq!(
            styles,
            vec!["background-color: yellow", "", "background-color: yellow"]
        );
    }

    #[test]
    fn test_highlight_where() {
        let styles = highlight_where(&[false, true], "orange");
        assert_eq!(styles, vec!["", "background-color: orange"]);
        assert!(highlight_where(&[], "red").is_empty());
    }
}
