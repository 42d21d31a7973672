use super::test_helpers::*;
use super::*;
use crate::config::{DownloadConfig, FormatPolicy};
use crate::types::{DownloadMetadata, ItemStatus};
use std::time::Duration;

mod auto;
