use std::path::PathBuf;

use validate_votable::{Attributes, Field, Param, Row, Table, VoTable};

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn catalogue_json(&self) -> PathBuf {
        self.fixtures_dir.join("catalogue.json")
    }

    pub fn validation_toml(&self) -> PathBuf {
        self.fixtures_dir.join("validation.toml")
    }

    pub fn read_catalogue(&self) -> VoTable {
        let content = std::fs::read_to_string(self.catalogue_json()).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}

impl Default for TestFixtures {
    fn default() -> Self {
        Self::new()
    }
}

pub fn field(name: &str, datatype: &str) -> Field {
    Field::new(Attributes::named(name).with_datatype(datatype))
}

pub fn char_field(name: &str, arraysize: &str) -> Field {
    Field::new(
        Attributes::named(name)
            .with_datatype("char")
            .with_arraysize(arraysize),
    )
}

pub fn param(name: &str, datatype: &str, value: &str) -> Param {
    Param::new(Attributes::named(name).with_datatype(datatype), value)
}

/// A small source catalogue: name, position, magnitude and a flag
pub fn catalogue_table() -> Table {
    Table::new()
        .description("Sources")
        .param(Param::new(
            Attributes::named("telescope")
                .with_datatype("char")
                .with_arraysize("*"),
            "VLT",
        ))
        .field(char_field("name", "8"))
        .field(
            Field::new(
                Attributes::named("ra")
                    .with_datatype("double")
                    .with_ucd("pos.eq.ra")
                    .with_unit("deg"),
            ),
        )
        .field(Field::new(
            Attributes::named("mag")
                .with_datatype("float")
                .with_precision("2"),
        ))
        .field(field("flag", "boolean"))
}

/// The catalogue with `count` clean rows
pub fn clean_catalogue(count: usize) -> VoTable {
    let mut table = catalogue_table();
    for i in 0..count {
        let name = format!("S{}", i);
        let ra = format!("{}.5", i % 360);
        table = table.row(Row::new([name.as_str(), ra.as_str(), "12.25", "T"]));
    }
    VoTable::single(table)
}
