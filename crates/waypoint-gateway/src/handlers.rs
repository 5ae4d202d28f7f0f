mod health;
mod not_found;
mod report;
mod rules;
mod settings;

pub use health::health_handler;
pub use not_found::{
    bulk_not_found_handler, convert_not_found_handler, delete_not_found_handler,
    get_not_found_handler, list_not_found_handler,
};
pub use report::report_handler;
pub use rules::{
    bulk_rules_handler, create_rule_handler, delete_rule_handler, get_rule_handler,
    list_rules_handler, toggle_rule_handler, update_rule_handler,
};
pub use settings::{get_settings_handler, update_settings_handler};
