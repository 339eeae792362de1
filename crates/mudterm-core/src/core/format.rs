//! Table layout for `inventory` and `equipment` command output.
//!
//! The game server returns both as loose text: a header line followed by
//! `Slot: Item` lines (equipment) or indented item lines grouped under
//! `Type:` headings (inventory). Anything that does not match is dropped.

use std::fmt::Write as _;

const SLOT_WIDTH: usize = 10;
const ITEM_WIDTH: usize = 25;
const COUNT_WIDTH: usize = 5;
const RULE_WIDTH: usize = 50;

/// Reformats known commands; other output is returned unchanged.
pub fn format_command_output(command: &str, output: &str) -> String {
    match command.trim().to_lowercase().as_str() {
        "inventory" | "inv" | "i" => format_inventory(output),
        "equipment" | "eq" => format_equipment(output),
        _ => output.to_string(),
    }
}

/// Lays out equipment as `slot | item` rows under a rule.
pub fn format_equipment(output: &str) -> String {
    let mut formatted = format!("Equipment:\n{}\n", "-".repeat(RULE_WIDTH));
    for line in output.lines().skip(1) {
        let Some((slot, item)) = line.split_once(':') else {
            continue;
        };
        let slot = slot.trim();
        let item = item.trim();
        let _ = writeln!(formatted, "{slot:<SLOT_WIDTH$} | {item}");
    }
    formatted.trim_end().to_string()
}

/// Lays out inventory sections with item names and stack counts aligned.
pub fn format_inventory(output: &str) -> String {
    let mut lines = output.lines();
    let header = lines.next().map(str::trim).unwrap_or_default();
    let mut formatted = format!("{header}\n");

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim_end().ends_with(':') {
            let _ = writeln!(formatted, "\n{}", line.trim());
        } else if line.starts_with("  ") {
            let item = line.trim();
            match item.rsplit_once(' ') {
                Some((name, count)) if count.starts_with("(x") => {
                    let _ = writeln!(formatted, "  {name:<ITEM_WIDTH$} {count:>COUNT_WIDTH$}");
                }
                _ => {
                    let _ = writeln!(formatted, "  {item}");
                }
            }
        }
    }
    formatted.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equipment_rows_are_aligned() {
        let raw = "Your equipment:\nHead: Empty\nBody: Kevlar Vest\nnot a slot";
        let formatted = format_equipment(raw);
        let lines: Vec<_> = formatted.lines().collect();
        assert_eq!(lines[0], "Equipment:");
        assert_eq!(lines[1], "-".repeat(50));
        assert_eq!(lines[2], "Head       | Empty");
        assert_eq!(lines[3], "Body       | Kevlar Vest");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_inventory_groups_and_counts() {
        let raw = "Inventory (3 items)\nWeapons:\n  Laser Pistol\nConsumables:\n  Medkit (x2)\n";
        let formatted = format_inventory(raw);
        assert!(formatted.starts_with("Inventory (3 items)\n\nWeapons:\n  Laser Pistol\n"));
        assert!(formatted.contains("  Laser Pistol\n\nConsumables:\n"));
        let medkit = formatted.lines().last().unwrap();
        assert_eq!(medkit, format!("  {:<25} {:>5}", "Medkit", "(x2)"));
    }

    #[test]
    fn test_other_commands_pass_through() {
        assert_eq!(format_command_output("look", "A dim hall."), "A dim hall.");
        assert!(format_command_output("EQUIPMENT", "x\nHands: Empty").starts_with("Equipment:"));
    }
}
