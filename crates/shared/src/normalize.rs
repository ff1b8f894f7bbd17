/// Normalize a display name for comparison and duplicate grouping.
///
/// Strips parenthesized cost/volume annotations like `(424.39₽)`, lowercases,
/// collapses runs of whitespace, and trims trailing punctuation.
/// Idempotent: `normalize_name(normalize_name(s)) == normalize_name(s)`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  let mut depth = 0usize;

  for ch in name.chars() {
    match ch {
      '(' => depth += 1,
      ')' => depth = depth.saturating_sub(1),
      _ if depth == 0 => {
        for lower in ch.to_lowercase() {
          out.push(lower);
        }
      }
      _ => {}
    }
  }

  let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
  collapsed
    .trim_end_matches(|c: char| c.is_ascii_punctuation() || c == '…')
    .trim()
    .to_owned()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_cost_annotations() {
    assert_eq!(normalize_name("Коктейль (424.39₽)"), "коктейль");
    assert_eq!(normalize_name("Server rack (x2) (1,200$)"), "server rack");
  }

  #[test]
  fn lowercases_and_collapses_whitespace() {
    assert_eq!(normalize_name("  Acme   Corp  "), "acme corp");
    assert_eq!(normalize_name("ACME\tCorp"), "acme corp");
  }

  #[test]
  fn strips_trailing_punctuation() {
    assert_eq!(normalize_name("Buy milk!!!"), "buy milk");
    assert_eq!(normalize_name("Plan, then ship."), "plan, then ship");
  }

  #[test]
  fn idempotent() {
    for s in ["Коктейль (424.39₽)", "  Acme   Corp  ", "Buy milk!!!"] {
      let once = normalize_name(s);
      assert_eq!(normalize_name(&once), once);
    }
  }

  #[test]
  fn empty_and_annotation_only() {
    assert_eq!(normalize_name(""), "");
    assert_eq!(normalize_name("(42$)"), "");
  }
}
