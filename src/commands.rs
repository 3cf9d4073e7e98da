//! Available commands, role gating, and autocomplete logic.

use crate::api::types::Role;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Minimum role allowed to see and run this command.
  pub min_role: Role,
}

/// All available commands.
///
/// The role → command mapping is exhaustive and closed: each command names
/// the least-privileged role that gets it, and `for_role` compares against
/// the ordered `Role` enum. This is presentation-only gating; the server
/// still checks the real permissions.
pub const COMMANDS: &[Command] = &[
  Command {
    name: "objectives",
    aliases: &["o", "obj"],
    description: "Browse objectives",
    min_role: Role::Staff,
  },
  Command {
    name: "notifications",
    aliases: &["n", "notif"],
    description: "View notifications",
    min_role: Role::Staff,
  },
  Command {
    name: "ratings",
    aliases: &["rating", "analytics"],
    description: "Rating analytics",
    min_role: Role::Staff,
  },
  Command {
    name: "users",
    aliases: &["u", "user"],
    description: "Manage users",
    min_role: Role::Admin,
  },
  Command {
    name: "departments",
    aliases: &["d", "dep", "dept"],
    description: "Manage departments",
    min_role: Role::Admin,
  },
  Command {
    name: "logout",
    aliases: &[],
    description: "Log out and return to login",
    min_role: Role::Staff,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit pmdash",
    min_role: Role::Staff,
  },
];

/// Commands available to a given role.
pub fn for_role(role: Role) -> Vec<&'static Command> {
  COMMANDS.iter().filter(|cmd| role >= cmd.min_role).collect()
}

/// Get autocomplete suggestions for a given input, filtered by role.
pub fn get_suggestions(input: &str, role: Role) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return for_role(role);
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in for_role(role) {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all_for_role() {
    let staff = get_suggestions("", Role::Staff);
    let admin = get_suggestions("", Role::Admin);
    assert!(staff.len() < admin.len());
    assert_eq!(admin.len(), COMMANDS.len());
  }

  #[test]
  fn test_staff_does_not_see_admin_commands() {
    let suggestions = get_suggestions("users", Role::Staff);
    assert!(suggestions.is_empty());

    let suggestions = get_suggestions("users", Role::Admin);
    assert_eq!(suggestions[0].name, "users");
  }

  #[test]
  fn test_super_admin_sees_everything() {
    let suggestions = get_suggestions("departments", Role::SuperAdmin);
    assert_eq!(suggestions[0].name, "departments");
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("objectives", Role::Staff);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "objectives");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("o", Role::Staff);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "objectives");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("obj", Role::Staff);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "objectives");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("ting", Role::Staff);
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "ratings");
  }
}
