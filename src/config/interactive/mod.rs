#[cfg(test)]
mod tests;

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::{Config, ConfigError, EmbeddingConfig, GeneratorConfig, Provider};

const PROVIDERS: [Provider; 2] = [Provider::Ollama, Provider::Gemini];

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Club RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir);

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Event descriptions and questions are embedded with this model.");
    eprintln!();
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Answer Generation").bold().yellow());
    eprintln!("Answers are written by this model from the retrieved event notes.");
    eprintln!();
    configure_generator(&mut config.generator)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());
    report_connection(
        "Embedding provider",
        &config.embedding.endpoint_url()?,
        config.embedding.provider,
    );
    report_connection(
        "Generator",
        &config.generator.endpoint_url()?,
        config.generator.provider,
    );

    if let Err(e) = config.validate() {
        eprintln!("{} {}", style("✗ Invalid configuration:").red(), e);
        return Ok(());
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!(
        "  Dimension: {}",
        style(config.embedding.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    print_endpoint(config.embedding.endpoint_url());

    eprintln!();
    eprintln!("{}", style("Generator:").bold().yellow());
    eprintln!("  Provider: {}", style(config.generator.provider).cyan());
    eprintln!("  Model: {}", style(&config.generator.model).cyan());
    eprintln!(
        "  Prompt Limit: {} chars",
        style(config.generator.max_prompt_chars).cyan()
    );
    print_endpoint(config.generator.endpoint_url());

    let uses_gemini = config.embedding.provider == Provider::Gemini
        || config.generator.provider == Provider::Gemini;
    if uses_gemini {
        let has_key = config
            .generator
            .api_key()
            .or_else(|| config.embedding.api_key())
            .is_some();
        let key_state = if has_key {
            style("set").green()
        } else {
            style("missing").red()
        };
        eprintln!("  Gemini API Key: {}", key_state);
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Min Similarity: {}",
        style(config.retrieval.min_similarity).cyan()
    );
    eprintln!(
        "  Diversity Penalty: {}",
        style(config.retrieval.diversity_penalty).cyan()
    );
    eprintln!(
        "  Chunk Size / Overlap: {} / {} words",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.overlap_size).cyan()
    );
    eprintln!(
        "  Prompt Budget: {} chars",
        style(config.prompt.max_prompt_chars).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn print_endpoint(url: Result<url::Url, ConfigError>) {
    match url {
        Ok(url) => eprintln!("  Endpoint: {}", style(url).cyan()),
        Err(e) => eprintln!("  Endpoint: {} ({})", style("Invalid").red(), e),
    }
}

fn load_existing_config(base_dir: &Path) -> Config {
    Config::load(base_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config::with_base_dir(base_dir)
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn select_provider(prompt: &str, current: Provider) -> Result<Provider> {
    let labels = ["Ollama (local)", "Gemini (Google AI)"];
    let default_index = PROVIDERS.iter().position(|&p| p == current).unwrap_or(0);

    let index = Select::new()
        .with_prompt(prompt)
        .default(default_index)
        .items(&labels)
        .interact()?;

    Ok(PROVIDERS[index])
}

fn prompt_ollama_endpoint(protocol: &mut String, host: &mut String, port: &mut u16) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == protocol.as_str())
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;
    let chosen_protocol = protocols[protocol_index].to_string();

    let chosen_host: String = Input::new()
        .with_prompt("Ollama host")
        .default(host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = EmbeddingConfig {
                protocol: chosen_protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let chosen_port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(*port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    *protocol = chosen_protocol;
    *host = chosen_host;
    *port = chosen_port;
    Ok(())
}

fn prompt_api_key(current: Option<String>) -> Result<Option<String>> {
    if current.is_some() {
        eprintln!("{}", style("A Gemini API key is already available.").green());
        if !Confirm::new()
            .with_prompt("Replace it?")
            .default(false)
            .interact()?
        {
            return Ok(None);
        }
    }

    let key = Password::new()
        .with_prompt("Gemini API key (leave empty to use GEMINI_API_KEY)")
        .allow_empty_password(true)
        .interact()?;

    Ok(Some(key).filter(|key| !key.trim().is_empty()))
}

fn prompt_model(label: &str, current: &str) -> Result<String> {
    Ok(Input::new()
        .with_prompt(label)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?)
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let provider = select_provider("Embedding provider", embedding.provider)?;
    embedding.set_provider(provider);

    match provider {
        Provider::Ollama => prompt_ollama_endpoint(
            &mut embedding.protocol,
            &mut embedding.host,
            &mut embedding.port,
        )?,
        Provider::Gemini => {
            if let Some(key) = prompt_api_key(embedding.api_key())? {
                embedding.api_key = Some(key);
            }
        }
    }

    let model = prompt_model("Embedding model", &embedding.model)?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (8..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 8 and 8192")
            }
        })
        .interact_text()?;

    embedding.set_model(model)?;
    embedding.set_embedding_dimension(dimension)?;

    Ok(())
}

fn configure_generator(generator: &mut GeneratorConfig) -> Result<()> {
    let provider = select_provider("Generation provider", generator.provider)?;
    generator.set_provider(provider);

    match provider {
        Provider::Ollama => prompt_ollama_endpoint(
            &mut generator.protocol,
            &mut generator.host,
            &mut generator.port,
        )?,
        Provider::Gemini => {
            if let Some(key) = prompt_api_key(generator.api_key())? {
                generator.api_key = Some(key);
            }
        }
    }

    let model = prompt_model("Generation model", &generator.model)?;
    generator.set_model(model)?;

    Ok(())
}

fn report_connection(label: &str, endpoint: &url::Url, provider: Provider) {
    if provider == Provider::Gemini {
        eprintln!(
            "{}",
            style(format!("• {}: Gemini endpoints are not probed", label)).dim()
        );
        return;
    }

    if test_ollama_connection(endpoint) {
        eprintln!("{}", style(format!("✓ {}: connection successful!", label)).green());
    } else {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: {} could not connect to Ollama", label)).yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting or asking.");
    }
}

fn test_ollama_connection(endpoint: &url::Url) -> bool {
    let Ok(url) = endpoint.join("api/version") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
