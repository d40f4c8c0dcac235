use super::*;
use crate::classify::ErrorKind;
use crate::orchestrator::test_helpers::*;
