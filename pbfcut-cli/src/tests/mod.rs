//! Shared test harness modules for the pbfcut CLI.

use super::*;

mod helpers;
