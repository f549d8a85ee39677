//! KGB Extractor - Knowledge extraction pipeline
//!
//! Named Entity Recognition (NER), dependency-rule and REBEL relation
//! extraction, and the pipeline that turns text into a knowledge graph.
//!
//! Author: hephaex@gmail.com

pub mod dependency;
pub mod inference;
pub mod ner;
pub mod pipeline;
pub mod rebel;
pub mod relation;

pub use dependency::{parse_conllu, DependencyParser, Sentence, Token, UdpipeClient};
pub use inference::InferenceClient;
pub use ner::{filter_entities, HostedNer, RuleBasedNer};
pub use pipeline::{KnowledgePipeline, PipelineOutput};
pub use rebel::{decode_generated_text, parse_rebel_output, RebelExtractor, RebelTriple};
pub use relation::{
    extract_svo, merge_relations, CompositeRelationExtractor, DependencyRelationExtractor,
};
