// Small query builder so that every data operation reads
// like "select/insert/update/delete on a table with some
// predicates". Values are always passed as prepared
// statement params, never formatted in.

use std::fmt;
use super::helpers::generate_value_placeholders;

pub enum Order {
  Asc,
  Desc
}

pub enum QueryType {
  // Table names:
  Select(Vec<String>),
  Insert(String),
  Update(String),
  Delete(String)
}

pub struct OrderBy {
  pub order: Order,
  pub fields: Vec<String>
}

impl OrderBy {
  pub fn new(order: Order, fields: Vec<String>) -> Self {
    OrderBy {
      order,
      fields
    }
  }
}

// The "q_" in front of field names is just because
// "where" is a reserved keyword in Rust.
// q_fields means:
// - Select: selected columns
// - Insert: columns receiving a "?" each
// - Update: full assignments ("title = ?", "n = n + 1")
// - Delete: ignored
pub struct Query {
  q_fields: Vec<String>,
  q_type: QueryType,
  q_where: Option<Vec<String>>,
  q_order: Option<OrderBy>,
  returning: Option<Vec<String>>
}

impl Query {

  pub fn new(query_type: QueryType, fields: Vec<String>) -> Self {
    Query {
      q_fields: fields,
      q_type: query_type,
      q_where: None,
      q_order: None,
      returning: None
    }
  }

  pub fn select(table: &str, fields: &[&str]) -> Self {
    Self::new(QueryType::Select(vec![table.to_string()]), to_strings(fields))
  }

  pub fn insert(table: &str, fields: &[&str]) -> Self {
    Self::new(QueryType::Insert(table.to_string()), to_strings(fields))
  }

  pub fn update(table: &str, assignments: &[&str]) -> Self {
    Self::new(QueryType::Update(table.to_string()), to_strings(assignments))
  }

  pub fn delete(table: &str) -> Self {
    Self::new(QueryType::Delete(table.to_string()), Vec::new())
  }

  // Predicates are always glued with AND.
  pub fn where_clause(mut self, where_str: &str) -> Self {
    self.q_where.get_or_insert_with(Vec::new).push(where_str.to_string());
    self
  }

  pub fn order(mut self, order: OrderBy) -> Self {
    self.q_order = Some(order);
    self
  }

  pub fn returning(mut self, fields: &[&str]) -> Self {
    self.returning = Some(to_strings(fields));
    self
  }

  fn where_str(&self) -> Option<String> {
    self.q_where.as_ref()
      .filter(|wh| !wh.is_empty())
      .map(|wh| format!("WHERE {}", wh.join(" AND ")))
  }

}

fn to_strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|v| v.to_string()).collect()
}

// Creating the query string is done by implementing
// Display, which gives us to_string() for free.
impl fmt::Display for Query {

  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut parts: Vec<String> = vec![
      match &self.q_type {
        QueryType::Select(q_from) => format!(
          "SELECT {} FROM {}",
          self.q_fields.join(","),
          q_from.join(",")
        ),
        QueryType::Insert(table) => format!(
          "INSERT INTO {} ({}) VALUES ({})",
          table,
          self.q_fields.join(","),
          generate_value_placeholders(self.q_fields.len())
        ),
        QueryType::Update(table) => format!(
          "UPDATE {} SET {}",
          table,
          self.q_fields.join(",")
        ),
        QueryType::Delete(table) => format!("DELETE FROM {}", table)
      }
    ];
    if let Some(wh) = self.where_str() {
      parts.push(wh);
    }
    if let Some(order) = &self.q_order {
      let direction = match order.order {
        Order::Asc => "ASC",
        Order::Desc => "DESC"
      };
      let fields: Vec<String> = order.fields.iter()
        .map(|field| format!("{} {}", field, direction))
        .collect();
      parts.push(format!("ORDER BY {}", fields.join(",")));
    }
    if let Some(returning) = &self.returning {
      parts.push(format!("RETURNING {}", returning.join(",")));
    }
    write!(f, "{}", parts.join(" "))
  }

}
