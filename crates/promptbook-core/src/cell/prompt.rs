//! Prompt cells: render the template and call the provider.

use crate::error::Result;
use crate::graph::DependencyAnalysis;
use crate::state::{State, Value};

use super::template;
use super::{Cell, CellContext, Execution, Output};

pub(super) fn execute(cell: &Cell, state: &State, ctx: &CellContext<'_>) -> Result<Execution> {
    let content = cell.content();
    let prompt = template::render(content, state)?;

    let config = cell.prompt_config();
    let model = config.model.as_deref().unwrap_or(&ctx.defaults.model);
    let temperature = config.temperature.unwrap_or(ctx.defaults.temperature);
    let max_tokens = config.max_tokens.or(ctx.defaults.max_tokens);

    tracing::debug!(
        cell = %cell.id(),
        provider = ctx.provider.name(),
        model,
        temperature,
        "calling provider"
    );
    let response = ctx.provider.generate(&prompt, model, temperature, max_tokens)?;

    let key = cell.response_key();
    let mut next = state.clone();
    next.insert(key.as_str(), Value::Str(response.clone()));

    let analysis = DependencyAnalysis {
        dependencies: template::placeholders(content)
            .into_iter()
            .filter(|name| state.contains_key(name))
            .map(str::to_string)
            .collect(),
        produces: [key].into_iter().collect(),
    };

    Ok(Execution {
        state: Some(next),
        outputs: vec![Output::LlmResponse {
            prompt,
            response,
            model: model.to_string(),
        }],
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::super::{CellKind, PromptConfig};
    use super::*;
    use crate::error::{Error, ProviderError};

    #[test]
    fn test_prompt_binds_response() {
        let fixture = Fixture::new();
        let cell = Cell::new(CellKind::Prompt, "Hello {name}");
        let state: State = [("name", Value::from("Ada"))].into_iter().collect();

        let execution = execute(&cell, &state, &fixture.context()).unwrap();
        let key = cell.response_key();
        let next = execution.state.unwrap();

        assert_eq!(
            next.get(&key),
            Some(&Value::from("Mock response to: Hello Ada"))
        );
        assert_eq!(execution.analysis.produces.len(), 1);
        assert!(execution.analysis.dependencies.contains("name"));
        assert!(matches!(
            &execution.outputs[0],
            Output::LlmResponse { prompt, model, .. } if prompt == "Hello Ada" && model == "gpt-4"
        ));
    }

    #[test]
    fn test_missing_placeholder_fails() {
        let fixture = Fixture::new();
        let cell = Cell::new(CellKind::Prompt, "Hello {name}");
        let err = execute(&cell, &State::new(), &fixture.context()).unwrap_err();
        assert!(matches!(err, Error::MissingVariable(_)));
    }

    #[test]
    fn test_per_cell_overrides() {
        let mut fixture = Fixture::new();
        fixture.defaults.temperature = 1.0;
        let cell = Cell::prompt(
            "Summarize",
            PromptConfig {
                model: Some("mock-small".into()),
                response_var: Some("summary".into()),
                ..PromptConfig::default()
            },
        )
        .unwrap();

        let execution = execute(&cell, &State::new(), &fixture.context()).unwrap();
        assert!(execution.state.unwrap().contains_key("summary"));
        assert!(matches!(
            &execution.outputs[0],
            Output::LlmResponse { model, .. } if model == "mock-small"
        ));
    }

    #[test]
    fn test_invalid_default_temperature_is_provider_error() {
        let mut fixture = Fixture::new();
        fixture.defaults.temperature = 9.0;
        let cell = Cell::new(CellKind::Prompt, "hi");
        let err = execute(&cell, &State::new(), &fixture.context()).unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::InvalidParameter(_))
        ));
    }
}
