// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Minimal scanner for the `settings.ini` dialect
//!
//! The dialect is deliberately small: `[Section]` headers, `key = value`
//! pairs with whitespace trimmed around both sides, `#` or `;` comment
//! lines, and free-form data lines (the `[Tags]` section carries
//! `name,address,type` triples that contain no `=`). Unknown content is
//! preserved as raw lines so each section decides how to interpret it.

/// One non-comment line of a section.
#[derive(Debug, Clone)]
pub struct IniLine {
    /// The trimmed line as it appeared in the file.
    pub raw: String,
    /// Present when the line was a `key = value` pair.
    pub key_value: Option<(String, String)>,
}

/// A `[Name]` section and its lines, in file order.
#[derive(Debug, Clone)]
pub struct IniSection {
    pub name: String,
    pub lines: Vec<IniLine>,
}

impl IniSection {
    /// Value of the first `key = value` line matching `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match &line.key_value {
            Some((k, v)) if k == key => Some(v.as_str()),
            _ => None,
        })
    }

    /// All raw lines, `key = value` or not.
    pub fn raw_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.raw.as_str())
    }
}

/// A parsed INI document.
#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    /// Parse `text` into sections. Lines before the first header are
    /// ignored, as are comment and blank lines.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<IniSection> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                sections.push(IniSection {
                    name: line[1..line.len() - 1].trim().to_string(),
                    lines: Vec::new(),
                });
                continue;
            }
            let Some(current) = sections.last_mut() else {
                continue;
            };
            let key_value = line.split_once('=').map(|(k, v)| {
                (k.trim().to_string(), v.trim().to_string())
            });
            current.lines.push(IniLine {
                raw: line.to_string(),
                key_value,
            });
        }
        Self { sections }
    }

    /// First section named `name`, if present.
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_trims_keys_and_values() {
        let doc = IniDocument::parse(
            "# leading comment\n\
             [Device]\n\
             slave_name =  SimplePLC  \n\
             ; another comment\n\
             slave_id=1\n\
             [ModbusServer]\n\
             port = 502\n",
        );
        let device = doc.section("Device").unwrap();
        assert_eq!(device.get("slave_name"), Some("SimplePLC"));
        assert_eq!(device.get("slave_id"), Some("1"));
        assert_eq!(doc.section("ModbusServer").unwrap().get("port"), Some("502"));
        assert!(doc.section("OPCUA").is_none());
    }

    #[test]
    fn keeps_free_form_lines() {
        let doc = IniDocument::parse(
            "[Tags]\n\
             Conveyor1_Running,0,0\n\
             # skipped\n\
             Speed_Setpoint,0,2\n",
        );
        let tags: Vec<&str> = doc.section("Tags").unwrap().raw_lines().collect();
        assert_eq!(tags, vec!["Conveyor1_Running,0,0", "Speed_Setpoint,0,2"]);
    }

    #[test]
    fn content_before_first_section_is_ignored() {
        let doc = IniDocument::parse("orphan = 1\n[Device]\nslave_id = 2\n");
        assert_eq!(doc.section("Device").unwrap().get("orphan"), None);
    }
}
