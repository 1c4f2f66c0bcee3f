//! RON cartridge loader

use crate::error::{Error, Result};
use crate::schema::handler::Reference;
use crate::schema::{CartridgeDefs, LocationDef, TargetDef};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// Loader for RON cartridge scripts
///
/// A cartridge may be split over several files; each one is a partial
/// `CartridgeDefs` and later files append to earlier ones.
#[derive(Debug, Default)]
pub struct Loader {
    defs: CartridgeDefs,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a complete script from a compiled payload
    pub fn from_bytes(payload: &[u8]) -> Result<CartridgeDefs> {
        let mut loader = Self::new();
        loader.load_str(std::str::from_utf8(payload)?)?;
        loader.finish()
    }

    /// Load definitions from a RON string
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let part: CartridgeDefs = ron::from_str(content)?;
        self.merge(part)
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let content = fs::read_to_string(path.as_ref())?;
        self.load_str(&content)
    }

    /// Load every `.ron` file in a directory, in file name order
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut files: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "ron"))
            .collect();
        files.sort();

        for file in files {
            tracing::debug!(file = %file.display(), "loading script file");
            self.load_file(&file)?;
        }
        Ok(())
    }

    fn merge(&mut self, part: CartridgeDefs) -> Result<()> {
        let defs = &mut self.defs;
        defs.media.extend(part.media);
        defs.zones.extend(part.zones);
        defs.characters.extend(part.characters);
        defs.items.extend(part.items);
        defs.tasks.extend(part.tasks);
        defs.timers.extend(part.timers);
        defs.inputs.extend(part.inputs);
        defs.commands.extend(part.commands);
        for (name, value) in part.variables {
            if defs.variables.contains_key(&name) {
                return Err(Error::DuplicateDefinition(format!("variable '{}'", name)));
            }
            defs.variables.insert(name, value);
        }
        defs.handlers.extend(part.handlers);
        Ok(())
    }

    /// Validate and return the definitions
    pub fn finish(self) -> Result<CartridgeDefs> {
        validate(&self.defs)?;
        Ok(self.defs)
    }
}

/// Kind of every declared object, by name
fn object_index(defs: &CartridgeDefs) -> Result<IndexMap<&str, &'static str>> {
    let declared = defs
        .media
        .iter()
        .map(|d| (d.name.as_str(), "media"))
        .chain(defs.zones.iter().map(|d| (d.name.as_str(), "zone")))
        .chain(defs.characters.iter().map(|d| (d.name.as_str(), "character")))
        .chain(defs.items.iter().map(|d| (d.name.as_str(), "item")))
        .chain(defs.tasks.iter().map(|d| (d.name.as_str(), "task")))
        .chain(defs.timers.iter().map(|d| (d.name.as_str(), "timer")))
        .chain(defs.inputs.iter().map(|d| (d.name.as_str(), "input")));

    let mut index = IndexMap::new();
    for (name, kind) in declared {
        if index.insert(name, kind).is_some() {
            return Err(Error::DuplicateDefinition(name.to_string()));
        }
    }
    Ok(index)
}

fn media(media: &Option<String>) -> Option<Reference<'_>> {
    media.as_deref().map(|name| ("media", name))
}

fn location(location: &LocationDef) -> Option<Reference<'_>> {
    match location {
        LocationDef::In(container) => Some(("container", container.as_str())),
        _ => None,
    }
}

/// Everything the definitions refer to by name
fn references(defs: &CartridgeDefs) -> Vec<Reference<'_>> {
    let mut refs = Vec::new();

    for zone in &defs.zones {
        refs.extend(media(&zone.media));
    }
    for item in &defs.items {
        refs.extend(media(&item.media));
        refs.extend(location(&item.location));
    }
    for character in &defs.characters {
        refs.extend(media(&character.media));
        refs.extend(location(&character.location));
    }
    for input in &defs.inputs {
        refs.extend(media(&input.media));
    }
    for task in &defs.tasks {
        refs.extend(task.parent.as_deref().map(|p| ("task", p)));
    }
    for command in &defs.commands {
        refs.extend(command.owner.as_deref().map(|o| ("object", o)));
        if let TargetDef::OneOf(targets) = &command.target {
            refs.extend(targets.iter().map(|t| ("object", t.as_str())));
        }
    }
    for handler in &defs.handlers {
        refs.extend(handler.on.references());
        refs.extend(handler.actions.iter().flat_map(|a| a.references()));
    }
    refs
}

fn resolves(kind: &str, declared: Option<&str>) -> bool {
    match (kind, declared) {
        (_, None) => false,
        ("object", Some(_)) => true,
        ("container", Some(found)) => matches!(found, "zone" | "item" | "character"),
        (expected, Some(found)) => expected == found,
    }
}

/// Check names are unique and every reference resolves to the right kind
pub fn validate(defs: &CartridgeDefs) -> Result<()> {
    let objects = object_index(defs)?;

    let mut commands = IndexMap::new();
    for command in &defs.commands {
        if commands.insert(command.name.as_str(), ()).is_some() {
            return Err(Error::DuplicateDefinition(format!("command '{}'", command.name)));
        }
    }

    for timer in &defs.timers {
        if !(timer.seconds.is_finite() && timer.seconds > 0.0) {
            return Err(Error::InvalidSchema(format!(
                "timer '{}' needs a positive duration, got {}",
                timer.name, timer.seconds
            )));
        }
    }

    for (kind, name) in references(defs) {
        let known = if kind == "command" {
            commands.contains_key(name)
        } else {
            resolves(kind, objects.get(name).copied())
        };
        if !known {
            return Err(Error::UnknownReference {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARBOUR: &str = r#"(
        media: [(name: "Horn", files: ["horn.wav"])],
        zones: [
            (
                name: "Pier",
                shape: Circle(center: (52.0, 4.0), radius: 20.0),
                proximity: 40.0,
                media: Some("Horn"),
            ),
        ],
        items: [(name: "Lamp", location: In("Pier"))],
        timers: [(name: "Tide", seconds: 60.0)],
        commands: [(name: "Take", text: "Take", owner: Some("Lamp"))],
        handlers: [
            (on: Command(command: "Take"), actions: [MoveTo("Lamp", Player), StartTimer("Tide")]),
        ],
    )"#;

    #[test]
    fn test_load_valid_script() {
        let defs = Loader::from_bytes(HARBOUR.as_bytes()).unwrap();
        assert_eq!(defs.zones.len(), 1);
        assert_eq!(defs.items[0].location, LocationDef::In("Pier".to_string()));
        assert_eq!(defs.handlers[0].actions.len(), 2);
    }

    #[test]
    fn test_duplicate_name_across_kinds() {
        let mut loader = Loader::new();
        loader
            .load_str(r#"(items: [(name: "Lamp")], timers: [(name: "Lamp", seconds: 5.0)])"#)
            .unwrap();
        assert!(matches!(loader.finish(), Err(Error::DuplicateDefinition(name)) if name == "Lamp"));
    }

    #[test]
    fn test_duplicate_command() {
        let mut loader = Loader::new();
        loader
            .load_str(r#"(commands: [(name: "Take", text: "Take"), (name: "Take", text: "Grab")])"#)
            .unwrap();
        assert!(matches!(loader.finish(), Err(Error::DuplicateDefinition(_))));
    }

    #[test]
    fn test_unknown_reference() {
        let script = r#"(handlers: [(on: Start, actions: [StartTimer("Tide")])])"#;
        match Loader::from_bytes(script.as_bytes()) {
            Err(Error::UnknownReference { kind, name }) => {
                assert_eq!(kind, "timer");
                assert_eq!(name, "Tide");
            }
            other => panic!("expected an unknown reference, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_of_wrong_kind() {
        // Lamp exists, but is not a timer
        let script = r#"(items: [(name: "Lamp")], handlers: [(on: Timer("Lamp"), actions: [])])"#;
        assert!(matches!(
            Loader::from_bytes(script.as_bytes()),
            Err(Error::UnknownReference { kind: "timer", .. })
        ));
    }

    #[test]
    fn test_item_cannot_be_placed_in_timer() {
        let script = r#"(
            timers: [(name: "Tide", seconds: 5.0)],
            items: [(name: "Lamp", location: In("Tide"))],
        )"#;
        assert!(matches!(
            Loader::from_bytes(script.as_bytes()),
            Err(Error::UnknownReference { kind: "container", .. })
        ));
    }

    #[test]
    fn test_timer_needs_positive_duration() {
        let script = r#"(timers: [(name: "Tide", seconds: 0.0)])"#;
        assert!(matches!(
            Loader::from_bytes(script.as_bytes()),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_split_script_merges() {
        let mut loader = Loader::new();
        loader
            .load_str(
                r#"(zones: [(
                    name: "Pier",
                    shape: Polygon([(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]),
                    proximity: 10.0,
                )])"#,
            )
            .unwrap();
        loader
            .load_str(r#"(handlers: [(on: Zone(zone: "Pier", state: Inside), actions: [])])"#)
            .unwrap();
        let defs = loader.finish().unwrap();
        assert_eq!(defs.zones.len(), 1);
        assert_eq!(defs.handlers.len(), 1);
    }

    #[test]
    fn test_duplicate_variable_across_files() {
        let mut loader = Loader::new();
        loader.load_str(r#"(variables: {"score": Int(0)})"#).unwrap();
        assert!(matches!(
            loader.load_str(r#"(variables: {"score": Int(1)})"#),
            Err(Error::DuplicateDefinition(_))
        ));
    }

    #[test]
    fn test_payload_must_be_utf8() {
        assert!(matches!(Loader::from_bytes(&[0xff, 0xfe]), Err(Error::Utf8(_))));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(Loader::from_bytes(b"(zones: [)"), Err(Error::Ron(_))));
    }
}
