pub mod consolidator;
pub mod pipeline_report;

pub use consolidator::{
    flatten_record, ArtifactConsolidator, ConsolidatedReport, WideTable, HISTORY_SOURCE_TAG,
    METADATA_SOURCE_TAG, ORIGINAL_FILE_COLUMN, SOURCE_COLUMN,
};
pub use pipeline_report::{PipelineReport, StageReport};
