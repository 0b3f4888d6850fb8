//! Tests for environment-driven configuration
//!
//! Environment variables are process-wide, so everything touching them lives
//! in a single test.

use std::env;

use memdiff_core::comparator::ComparatorConfig;
use memdiff_core::error::MemdiffError;
use memdiff_core::model::{ListPolicy, ModelOptions};

const KEYS: [&str; 6] = [
    "MEMDIFF_WORKERS",
    "MEMDIFF_BATCH_SIZE",
    "MEMDIFF_MAX_PATH_DEPTH",
    "MEMDIFF_LIST_POLICY",
    "MEMDIFF_MAX_DEPTH",
    "MEMDIFF_MAX_STRING_LEN",
];

fn clear()
{
    for key in KEYS {
        env::remove_var(key);
    }
}

#[test]
fn test_from_env()
{
    clear();
    assert_eq!(ComparatorConfig::from_env().unwrap(), ComparatorConfig::default());
    assert_eq!(ModelOptions::from_env().unwrap(), ModelOptions::default());

    env::set_var("MEMDIFF_WORKERS", "3");
    env::set_var("MEMDIFF_BATCH_SIZE", " 7 ");
    env::set_var("MEMDIFF_MAX_PATH_DEPTH", "12");
    env::set_var("MEMDIFF_LIST_POLICY", "Follow");
    env::set_var("MEMDIFF_MAX_STRING_LEN", "64");
    let config = ComparatorConfig::from_env().unwrap();
    assert_eq!(config.workers, 3);
    assert_eq!(config.batch_size, 7);
    assert_eq!(config.max_path_depth, Some(12));
    let options = ModelOptions::from_env().unwrap();
    assert_eq!(options.list_policy, ListPolicy::Follow);
    assert_eq!(options.max_string_len, 64);
    assert_eq!(options.max_depth, 8);

    env::set_var("MEMDIFF_WORKERS", "many");
    let err = ComparatorConfig::from_env().unwrap_err();
    assert!(matches!(err, MemdiffError::Config(_)));
    assert!(err.to_string().contains("MEMDIFF_WORKERS"));

    env::set_var("MEMDIFF_WORKERS", "0");
    assert!(matches!(ComparatorConfig::from_env(), Err(MemdiffError::Config(_))));

    env::set_var("MEMDIFF_LIST_POLICY", "walk");
    assert!(matches!(ModelOptions::from_env(), Err(MemdiffError::Config(_))));

    clear();
}
