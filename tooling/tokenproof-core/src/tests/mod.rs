mod oracle_tests;
mod scenario_tests;
mod support;
