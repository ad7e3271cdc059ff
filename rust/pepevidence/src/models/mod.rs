mod attr;
mod evidence_set;
mod protein;

pub use attr::{
    AttrValue,
    Attrs,
};
pub use evidence_set::{
    EvidenceSet,
    MisalignedSources,
    PipelineStage,
};
pub use protein::{
    Match,
    Modification,
    Protein,
    Source,
    Spectrum,
};
