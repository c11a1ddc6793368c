//! Parsed VOTABLE document model and the visitor contract used to walk it.
//!
//! Only the subset of VOTABLE the validator understands is modelled: a list
//! of TABLEs whose children are DESCRIPTION, PARAM, FIELD and DATA elements,
//! plus a catch-all for anything else so the walk can reject it.

use serde::{Deserialize, Serialize};

use crate::datatype::FieldDatatype;
use crate::error::{Result, VisitError};

/// The descriptive attributes shared by FIELD and PARAM elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub name: Option<String>,
    #[serde(rename = "ID")]
    pub id: Option<String>,
    pub ucd: Option<String>,
    pub datatype: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub unit: Option<String>,
    pub arraysize: Option<String>,
    pub width: Option<i64>,
    pub precision: Option<String>,
}

impl Attributes {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The name, or the empty string when absent
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_ucd(mut self, ucd: impl Into<String>) -> Self {
        self.ucd = Some(ucd.into());
        self
    }

    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_arraysize(mut self, arraysize: impl Into<String>) -> Self {
        self.arraysize = Some(arraysize.into());
        self
    }

    pub fn with_width(mut self, width: i64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_precision(mut self, precision: impl Into<String>) -> Self {
        self.precision = Some(precision.into());
        self
    }
}

/// Column descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Field {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }

    pub fn name(&self) -> &str {
        self.attributes.name()
    }
}

impl AsRef<Attributes> for Field {
    fn as_ref(&self) -> &Attributes {
        &self.attributes
    }
}

/// Table-level scalar: a FIELD's attributes plus a literal value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    #[serde(flatten)]
    pub attributes: Attributes,
    #[serde(default)]
    pub value: String,
}

impl Param {
    pub fn new(attributes: Attributes, value: impl Into<String>) -> Self {
        Self {
            attributes,
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        self.attributes.name()
    }

    /// The value normalised by the declared datatype; `None` stands for null
    pub fn converted_value(&self) -> Option<String> {
        match FieldDatatype::for_attributes(&self.attributes) {
            Ok(datatype) => datatype.convert_value(&self.value),
            Err(_) => Some(self.value.trim().to_string()).filter(|value| !value.is_empty()),
        }
    }
}

impl AsRef<Attributes> for Param {
    fn as_ref(&self) -> &Attributes {
        &self.attributes
    }
}

/// A TD element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cell {
    pub value: String,
}

impl Cell {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A TR element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Cell::new).collect(),
        }
    }
}

/// The DATA element, already reduced to its TABLEDATA rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// A child element of a TABLE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableElement {
    Description(String),
    Param(Param),
    Field(Field),
    Data(Data),
    /// Any other element, by name (GROUP, LINK, INFO, ...)
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub elements: Vec<TableElement>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.elements.push(TableElement::Description(text.into()));
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.elements.push(TableElement::Param(param));
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.elements.push(TableElement::Field(field));
        self
    }

    /// Append a row to the trailing DATA element, opening one if needed
    pub fn row(mut self, row: Row) -> Self {
        match self.elements.last_mut() {
            Some(TableElement::Data(data)) => data.rows.push(row),
            _ => self
                .elements
                .push(TableElement::Data(Data { rows: vec![row] })),
        }
        self
    }

    pub fn element(mut self, element: TableElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoTable {
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl VoTable {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn single(table: Table) -> Self {
        Self {
            tables: vec![table],
        }
    }
}

impl From<Table> for VoTable {
    fn from(table: Table) -> Self {
        Self::single(table)
    }
}

/// Receives document events in document order.
///
/// Nested elements are only delivered after their parent: `visit_table`,
/// then PARAM/FIELD events, then one `visit_row` per TR followed by a
/// `visit_cell` per TD, then `stop`.
pub trait VoTableVisitor {
    fn visit_table(&mut self, table: &Table) -> Result<()>;
    fn visit_param(&mut self, param: &Param) -> Result<()>;
    fn visit_field(&mut self, field: &Field) -> Result<()>;
    fn visit_row(&mut self, row: &Row) -> Result<()>;
    fn visit_cell(&mut self, cell: &Cell) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

/// Double dispatch into a [`VoTableVisitor`]
pub trait Visitable {
    fn accept(&self, visitor: &mut dyn VoTableVisitor) -> Result<()>;
}

impl Visitable for VoTable {
    /// Walks the first TABLE; any further TABLE is announced but not entered
    fn accept(&self, visitor: &mut dyn VoTableVisitor) -> Result<()> {
        let (first, rest) = self.tables.split_first().ok_or(VisitError::MissingTable)?;
        first.accept(visitor)?;
        for extra in rest {
            tracing::debug!("skipping contents of additional TABLE");
            visitor.visit_table(extra)?;
        }
        visitor.stop()
    }
}

impl Visitable for Table {
    fn accept(&self, visitor: &mut dyn VoTableVisitor) -> Result<()> {
        visitor.visit_table(self)?;
        for element in &self.elements {
            match element {
                TableElement::Description(_) => {}
                TableElement::Param(param) => param.accept(visitor)?,
                TableElement::Field(field) => field.accept(visitor)?,
                TableElement::Data(data) => {
                    for row in &data.rows {
                        row.accept(visitor)?;
                    }
                }
                TableElement::Other(name) => {
                    return Err(VisitError::UnsupportedElement {
                        element: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Visitable for Param {
    fn accept(&self, visitor: &mut dyn VoTableVisitor) -> Result<()> {
        visitor.visit_param(self)
    }
}

impl Visitable for Field {
    fn accept(&self, visitor: &mut dyn VoTableVisitor) -> Result<()> {
        visitor.visit_field(self)
    }
}

impl Visitable for Row {
    fn accept(&self, visitor: &mut dyn VoTableVisitor) -> Result<()> {
        visitor.visit_row(self)?;
        for cell in &self.cells {
            cell.accept(visitor)?;
        }
        Ok(())
    }
}

impl Visitable for Cell {
    fn accept(&self, visitor: &mut dyn VoTableVisitor) -> Result<()> {
        visitor.visit_cell(self)
    }
}
