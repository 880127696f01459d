use clap::builder::PossibleValue;
use clap::{crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    let mut args = vec![
        Arg::new("log-level")
            .long("log-level")
            .value_name("LOG_LEVEL")
            .env("NODE_SELECTOR_WEBHOOK_LOG_LEVEL")
            .default_value("info")
            .value_parser([
                PossibleValue::new("trace"),
                PossibleValue::new("debug"),
                PossibleValue::new("info"),
                PossibleValue::new("warn"),
                PossibleValue::new("error"),
            ])
            .help("Log level"),
        Arg::new("log-fmt")
            .long("log-fmt")
            .value_name("LOG_FMT")
            .env("NODE_SELECTOR_WEBHOOK_LOG_FMT")
            .default_value("text")
            .value_parser([PossibleValue::new("text"), PossibleValue::new("json")])
            .help("Log output format"),
        Arg::new("log-no-color")
            .long("log-no-color")
            .env("NODE_SELECTOR_WEBHOOK_LOG_NO_COLOR")
            .action(ArgAction::SetTrue)
            .help("Disable colored output for logs"),
        Arg::new("address")
            .long("addr")
            .value_name("BIND_ADDRESS")
            .default_value("0.0.0.0")
            .env("NODE_SELECTOR_WEBHOOK_BIND_ADDRESS")
            .help("Bind against ADDRESS"),
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .default_value("4443")
            .env("NODE_SELECTOR_WEBHOOK_PORT")
            .help("Listen on PORT"),
        Arg::new("cert-file")
            .long("cert-file")
            .value_name("CERT_FILE")
            .default_value("")
            .env("NODE_SELECTOR_WEBHOOK_CERT_FILE")
            .help("Path to an X.509 certificate file for HTTPS"),
        Arg::new("key-file")
            .long("key-file")
            .value_name("KEY_FILE")
            .default_value("")
            .env("NODE_SELECTOR_WEBHOOK_KEY_FILE")
            .help("Path to an X.509 private key file for HTTPS"),
        Arg::new("settings")
            .long("settings")
            .value_name("SETTINGS_FILE")
            .env("NODE_SELECTOR_WEBHOOK_SETTINGS")
            .help("YAML file holding the ignored namespaces, the node selector annotations and the cluster default node selector"),
        Arg::new("kubernetes-timeout")
            .long("kubernetes-timeout")
            .value_name("SECONDS")
            .default_value("5")
            .env("NODE_SELECTOR_WEBHOOK_KUBERNETES_TIMEOUT")
            .help("Interrupt the lookup of a namespace that is not cached after the given time"),
        Arg::new("shutdown-timeout")
            .long("shutdown-timeout")
            .value_name("SECONDS")
            .default_value("30")
            .env("NODE_SELECTOR_WEBHOOK_SHUTDOWN_TIMEOUT")
            .help("Close the pending connections after the given time when shutting down"),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new(crate_name!())
        .author(crate_authors!())
        .version(crate_version!())
        .about(crate_description!())
        .args(args)
}
