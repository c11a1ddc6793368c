use validate_votable::{Field, HookContext, Param, RowProcessor, RowValues};

/// Records everything handed to the processing hooks
#[derive(Debug, Default)]
pub struct CollectingProcessor {
    pub param_calls: usize,
    pub field_calls: usize,
    pub params: Vec<(String, Option<String>)>,
    pub fields: Vec<String>,
    pub rows: Vec<(usize, Vec<Option<String>>)>,
    pub saw_table_errors: bool,
}

impl RowProcessor for CollectingProcessor {
    fn process_params(
        &mut self,
        params: &[Param],
        context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        self.param_calls += 1;
        self.saw_table_errors |= context.has_table_errors();
        self.params = params
            .iter()
            .map(|param| (param.name().to_string(), param.converted_value()))
            .collect();
        Ok(())
    }

    fn process_fields(
        &mut self,
        fields: &[Field],
        _context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        self.field_calls += 1;
        self.fields = fields.iter().map(|field| field.name().to_string()).collect();
        Ok(())
    }

    fn process_row(
        &mut self,
        row: &RowValues<'_>,
        _context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        let values = row.iter().map(|(_, value)| value.map(str::to_string)).collect();
        self.rows.push((row.index(), values));
        Ok(())
    }
}

/// Rejects rows whose `mag` is brighter than a limit, through the error log
#[derive(Debug)]
pub struct MagnitudeLimit {
    pub limit: f64,
    pub accepted: Vec<usize>,
}

impl MagnitudeLimit {
    pub fn new(limit: f64) -> Self {
        Self {
            limit,
            accepted: Vec::new(),
        }
    }
}

impl RowProcessor for MagnitudeLimit {
    fn process_row(
        &mut self,
        row: &RowValues<'_>,
        context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        let mag: f64 = row.get("mag").unwrap_or("99").parse()?;
        if mag < self.limit {
            context.record_row_error(format!("Source brighter than {}", self.limit))?;
        } else {
            self.accepted.push(row.index());
        }
        Ok(())
    }
}

/// Fails the way an unavailable downstream store would
#[derive(Debug, Default)]
pub struct FailingProcessor;

impl RowProcessor for FailingProcessor {
    fn process_fields(
        &mut self,
        _fields: &[Field],
        _context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("catalogue store unavailable"))
    }
}
