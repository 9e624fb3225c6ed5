use std::{collections::HashMap, env::Args, sync::Arc, time::Duration};

use cached_model::{Options, Store};

#[derive(Debug, Default)]
pub struct Config(pub HashMap<Parameter, String>);

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Parameter {
    Key,
    Url,
    StoreInterval,
    ApiInterval,
    Name,
    Redis,
}

impl Parameter {
    pub fn deserialize(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "key" => Ok(Parameter::Key),
            "url" => Ok(Parameter::Url),
            "store-interval" => Ok(Parameter::StoreInterval),
            "api-interval" => Ok(Parameter::ApiInterval),
            "name" => Ok(Parameter::Name),
            "redis" => Ok(Parameter::Redis),
            _ => anyhow::bail!("unknown parameter {:?}", s),
        }
    }
}

/// Load config from command line arguments
pub fn parse_args(args: Args) -> anyhow::Result<Config> {
    parse(args.skip(1))
}

fn parse<I: Iterator<Item = String>>(args: I) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let mut current_key = None;
    for arg in args {
        if let Some(current_key) = current_key.take() {
            config.0.insert(current_key, arg);
        } else if let Some(name) = arg.strip_prefix("--") {
            current_key = Some(Parameter::deserialize(name)?);
        } else {
            anyhow::bail!("invalid argument {:?}", arg)
        }
    }
    if let Some(key) = current_key {
        anyhow::bail!("missing value for {:?}", key)
    }
    Ok(config)
}

impl Config {
    pub fn get(&self, parameter: Parameter) -> Option<&str> {
        self.0.get(&parameter).map(String::as_str)
    }

    fn interval(&self, parameter: Parameter) -> anyhow::Result<Option<Duration>> {
        match self.get(parameter) {
            Some(millis) => match millis.parse::<u64>() {
                Ok(millis) => Ok(Some(Duration::from_millis(millis))),
                Err(_) => anyhow::bail!("invalid interval {:?} for {:?}", millis, parameter),
            },
            None => Ok(None),
        }
    }

    pub fn into_options(self, store: Arc<dyn Store>) -> anyhow::Result<Options> {
        Ok(Options {
            key: self.get(Parameter::Key).map(str::to_string),
            store: Some(store),
            store_interval: self.interval(Parameter::StoreInterval)?,
            api_interval: self.interval(Parameter::ApiInterval)?,
            url: self.get(Parameter::Url).map(str::to_string),
            name: self.get(Parameter::Name).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use cached_model::MemoryStore;

    use super::{parse, Parameter};

    fn args(s: &str) -> impl Iterator<Item = String> + '_ {
        s.split_whitespace().map(str::to_string)
    }

    #[test]
    fn parse_flags() {
        let config = parse(args(
            "--key countries --url http://localhost/countries --store-interval 1000 --api-interval 60000",
        ))
        .unwrap();
        assert_eq!(config.get(Parameter::Key), Some("countries"));
        assert_eq!(config.get(Parameter::Redis), None);

        let options = config
            .into_options(Arc::new(MemoryStore::new()))
            .unwrap();
        assert_eq!(options.key.as_deref(), Some("countries"));
        assert_eq!(options.url.as_deref(), Some("http://localhost/countries"));
        assert_eq!(options.store_interval, Some(Duration::from_millis(1000)));
        assert_eq!(options.api_interval, Some(Duration::from_millis(60000)));
        assert_eq!(options.name, None);
    }

    #[test]
    fn parse_errors() {
        assert!(parse(args("--bogus 1")).is_err());
        assert!(parse(args("countries")).is_err());
        assert!(parse(args("--key")).is_err());

        let config = parse(args("--key k --api-interval soon")).unwrap();
        assert!(config.into_options(Arc::new(MemoryStore::new())).is_err());
    }
}
