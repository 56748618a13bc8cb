/// Where one annotation project's decisions are written back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// Annotation-tool project name, matched exactly.
    pub project_name: String,
    /// Table receiving `reviewer_label`, `reviewer_comment` and `reviewed_at`.
    pub table: String,
    /// Primary-key column of `table`. Also the `meta` key the row id was
    /// stored under when the document was created.
    pub id_column: String,
}

impl ExportTarget {
    pub fn new(
        project_name: impl Into<String>,
        table: impl Into<String>,
        id_column: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            table: table.into(),
            id_column: id_column.into(),
        }
    }

    /// Key looked up in an exported record's `meta` mapping.
    pub fn meta_key(&self) -> &str {
        &self.id_column
    }
}
