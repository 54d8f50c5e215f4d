/// Available commands and autocomplete logic
#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "categories",
    aliases: &["cat", "category"],
    description: "Manage product categories",
  },
  Command {
    name: "practices",
    aliases: &["pa", "practice-areas"],
    description: "Manage practice areas",
  },
  Command {
    name: "resource-types",
    aliases: &["rt", "resources"],
    description: "Manage resource types",
  },
  Command {
    name: "products",
    aliases: &["p", "product"],
    description: "Browse product listings",
  },
  Command {
    name: "services",
    aliases: &["sv", "service"],
    description: "Browse legal services",
  },
  Command {
    name: "blogs",
    aliases: &["b", "blog"],
    description: "Browse blog posts",
  },
  Command {
    name: "promos",
    aliases: &["pc", "promo-codes"],
    description: "Manage promo codes",
  },
  Command {
    name: "sales",
    aliases: &["s", "revenue"],
    description: "Revenue and order search",
  },
  Command {
    name: "messages",
    aliases: &["m", "conversations"],
    description: "Customer conversations",
  },
  Command {
    name: "questions",
    aliases: &["qa", "question"],
    description: "Answer customer questions",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit l9s",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
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
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("categories");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "categories");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("pa");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "practices");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("cat");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "categories");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("venue");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "sales");
  }

  #[test]
  fn test_alias_beats_prefix() {
    // "s" is an exact alias of sales and a prefix of services
    let suggestions = get_suggestions("s");
    assert_eq!(suggestions[0].name, "sales");
  }
}
