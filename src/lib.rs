//! manga-recap - narrated recap videos from manga chapters
//!
//! Reads the text of every page (OCR), turns it into a narration script,
//! synthesizes the narration and renders a video that shows the pages in step
//! with the voice. Each stage is checkpointed so an interrupted run resumes
//! where it stopped.

pub mod catalog;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod narration;
pub mod ocr;
pub mod openai;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod speech;
pub mod timing;
