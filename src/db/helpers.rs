use super::entities::{Visitor, VisitOutcome};

// For INSERT ... VALUES (?,?,?)
pub fn generate_value_placeholders(count: usize) -> String {
  vec!["?"; count].join(",")
}

// Decides what a visit does to the stored record. The
// window is strict: a visit exactly window_secs after the
// last counted one is still inside it.
pub fn next_visit(
  existing: Option<Visitor>,
  visitor_id: &str,
  now: i64,
  window_secs: i64
) -> (VisitOutcome, Visitor) {
  match existing {
    None => (
      VisitOutcome::Created,
      Visitor {
        visitor_id: visitor_id.to_string(),
        view: 1,
        visit_time: now
      }
    ),
    Some(visitor) => {
      if now - visitor.visit_time > window_secs {
        (
          VisitOutcome::Counted,
          Visitor {
            view: visitor.view + 1,
            visit_time: now,
            ..visitor
          }
        )
      } else {
        (VisitOutcome::Unchanged, visitor)
      }
    }
  }
}
