//! Entity-type labels used to group cache entries for bulk invalidation.

/// Closed set of entity types served by the API.
///
/// Every query result carries at least one tag; every mutation declares the
/// set of tags it invalidates. Invalidation is a pure set-intersection rule
/// and never looks at the argument a query was keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
  Objective,
  Task,
  SubTask,
  Comment,
  User,
  Department,
  Organization,
  Notification,
  Rating,
}

impl std::fmt::Display for Tag {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Tag::Objective => "Objective",
      Tag::Task => "Task",
      Tag::SubTask => "SubTask",
      Tag::Comment => "Comment",
      Tag::User => "User",
      Tag::Department => "Department",
      Tag::Organization => "Organization",
      Tag::Notification => "Notification",
      Tag::Rating => "Rating",
    };
    write!(f, "{}", name)
  }
}
