const COMMANDS: &[&str] = &[
  "get_products",
  "purchase",
  "finish_transaction",
  "restore_purchases",
  "billing_state",
  "installation_source",
  "request_review",
  "check_for_update",
  "prompt_for_update",
  "complete_update",
];

fn main() {
  tauri_plugin::Builder::new(COMMANDS)
    .android_path("android")
    .ios_path("ios")
    .build();
}
