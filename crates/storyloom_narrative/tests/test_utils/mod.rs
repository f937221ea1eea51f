//! Test utilities for Storyloom narrative tests.
//!
//! This module provides a scripted model client, a recording progress
//! repository and artifact fixtures.

pub mod fixtures;
pub mod mock_model;
pub mod recording_repo;

#[allow(unused_imports)]
pub use fixtures::{keyframe_json, prompts, state, storyboard_briefs, storyboard_json};
#[allow(unused_imports)]
pub use mock_model::{MockModelClient, MockResponse};
#[allow(unused_imports)]
pub use recording_repo::RecordingProgressRepository;
