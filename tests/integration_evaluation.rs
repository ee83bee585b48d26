// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end property evaluation: substitution, conditions, imports and
//! global properties

use octofhir_msbuild::evaluator::ConditionEvaluator;
use octofhir_msbuild::host::{Host, MemoryFileSystem};
use octofhir_msbuild::{PropertyContext, StaticFunctionRegistry};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::Path;
use std::sync::Arc;

mod utils;
use utils::IntegrationTestContext;

const APP: &str = r#"<Project>
  <PropertyGroup>
    <Configuration Condition="'$(Configuration)' == ''">Debug</Configuration>
    <Name>Sample.App</Name>
    <Version>1.2.3</Version>
    <Build>$(BUILD_NUMBER)</Build>
    <OutputPath>bin\$(Configuration)\</OutputPath>
  </PropertyGroup>
</Project>"#;

#[tokio::test]
async fn test_text_without_references_is_unchanged() {
    let ctx = IntegrationTestContext::new(&[("/work/app.csproj", APP)]);
    let evaluation = ctx.evaluate("/work/app.csproj").await;

    for text in ["", "plain text", "50% done", "$ (not a token)", "@(Items)"] {
        assert_eq!(ctx.expand(&evaluation, text).await, text);
    }
}

#[tokio::test]
async fn test_defined_and_undefined_properties() {
    let ctx = IntegrationTestContext::new(&[("/work/app.csproj", APP)]);
    let evaluation = ctx.evaluate("/work/app.csproj").await;

    assert_eq!(ctx.expand(&evaluation, "pre$(Name)post").await, "preSample.Apppost");
    assert_eq!(ctx.expand(&evaluation, "pre$(Missing)post").await, "prepost");

    let kept = ctx
        .evaluator
        .expander(&evaluation.properties)
        .substitute("pre$(Missing)post", true)
        .await;
    assert_eq!(kept, "pre$(Missing)post");
}

#[tokio::test]
async fn test_property_functions_compose_left_to_right() {
    let ctx = IntegrationTestContext::new(&[("/work/app.csproj", APP)]);
    let evaluation = ctx.evaluate("/work/app.csproj").await;

    let upper = "SAMPLE.APP";
    assert_eq!(
        ctx.expand(&evaluation, "$(Name.ToUpper().Length)").await,
        upper.len().to_string()
    );
    assert_eq!(
        ctx.expand(&evaluation, "$(Name.Split('.')[1].ToLower())").await,
        "app"
    );
    assert_eq!(
        ctx.expand(&evaluation, "$([System.Version]::Parse($(Version)).Minor)").await,
        "2"
    );
    assert_eq!(
        ctx.expand(&evaluation, "$([MSBuild]::Add($(Build), 1))").await,
        "43"
    );
    assert_eq!(
        ctx.expand(&evaluation, "$([System.IO.Path]::GetFileName('a/b/c.txt'))").await,
        "c.txt"
    );
}

#[tokio::test]
async fn test_unknown_functions_leave_placeholders() {
    let ctx = IntegrationTestContext::new(&[("/work/app.csproj", APP)]);
    let evaluation = ctx.evaluate("/work/app.csproj").await;

    let text = ctx.expand(&evaluation, "x$([Nope]::Thing(1))y").await;
    assert!(text.starts_with('x') && text.ends_with('y'));
    assert!(text.contains("unknown_"));
}

#[tokio::test]
async fn test_oversized_arguments_do_not_abort_evaluation() {
    let ctx = IntegrationTestContext::new(&[(
        "/work/huge.proj",
        r#"<Project>
            <PropertyGroup>
                <N>abcdef</N>
                <X>$(N.Substring(1, 99999999999999999999))</X>
                <Y>$(N.PadLeft(4294967296))</Y>
                <After>done</After>
            </PropertyGroup>
        </Project>"#,
    )]);
    let evaluation = ctx.evaluate("/work/huge.proj").await;

    assert_eq!(
        evaluation.properties.get("X"),
        Some("unknown_Substring(1, 99999999999999999999)")
    );
    assert!(evaluation.properties.get("Y").is_some_and(|y| y.starts_with("unknown_PadLeft")));
    assert_eq!(evaluation.properties.get("After"), Some("done"));
}

#[tokio::test]
async fn test_default_condition_and_globals() {
    let ctx = IntegrationTestContext::new(&[("/work/app.csproj", APP)]);

    let evaluation = ctx.evaluate("/work/app.csproj").await;
    assert_eq!(evaluation.properties.get("Configuration"), Some("Debug"));
    assert_eq!(evaluation.properties.get("OutputPath"), Some(r"bin\Debug\"));

    let evaluation = ctx
        .evaluate_with("/work/app.csproj", None, &[("Configuration", "Release")])
        .await;
    assert_eq!(evaluation.properties.get("Configuration"), Some("Release"));
    assert_eq!(evaluation.properties.get("OutputPath"), Some(r"bin\Release\"));
}

#[tokio::test]
async fn test_global_protected_unless_local() {
    let body = r#"<PropertyGroup><Platform>AnyCPU</Platform></PropertyGroup></Project>"#;
    let protected = format!("<Project>{body}");
    let local = format!(r#"<Project TreatAsLocalProperty="$(LocalNames)">{body}"#);
    let ctx = IntegrationTestContext::new(&[
        ("/work/protected.csproj", protected.as_str()),
        ("/work/local.csproj", local.as_str()),
    ]);
    let globals = [("Platform", "x64"), ("LocalNames", "Platform;Other")];

    let evaluation = ctx.evaluate_with("/work/protected.csproj", None, &globals).await;
    assert_eq!(evaluation.properties.get("Platform"), Some("x64"));

    let evaluation = ctx.evaluate_with("/work/local.csproj", None, &globals).await;
    assert_eq!(evaluation.properties.get("Platform"), Some("AnyCPU"));
}

#[tokio::test]
async fn test_configuration_condition_becomes_globals() {
    let ctx = IntegrationTestContext::new(&[("/work/app.csproj", APP)]);
    let evaluation = ctx
        .evaluate_with(
            "/work/app.csproj",
            Some("'$(Configuration)|$(Platform)' == 'Release|ARM64'"),
            &[],
        )
        .await;

    assert_eq!(evaluation.properties.get("Configuration"), Some("Release"));
    assert_eq!(evaluation.properties.get("Platform"), Some("ARM64"));
}

#[tokio::test]
async fn test_same_import_evaluated_once() {
    let ctx = IntegrationTestContext::new(&[
        (
            "/work/common.props",
            "<Project><PropertyGroup><Count>$(Count)x</Count></PropertyGroup></Project>",
        ),
        (
            "/work/build/inner.props",
            r#"<Project><Import Project="$(MSBuildThisFileDirectory)..\common.props" /></Project>"#,
        ),
        (
            "/work/app.csproj",
            r#"<Project>
                <Import Project="common.props" />
                <ImportGroup Label="Shared">
                    <Import Project="build/inner.props" />
                    <Import Project="./common.props" />
                </ImportGroup>
                <Import Project="build/*.props" />
            </Project>"#,
        ),
    ]);

    let evaluation = ctx.evaluate("/work/app.csproj").await;

    assert_eq!(evaluation.properties.get("Count"), Some("x"));
    assert_eq!(evaluation.imports.len(), 2);
    assert_eq!(evaluation.imports.group("Shared").len(), 1);
}

#[tokio::test]
async fn test_imported_properties_flow_forward() {
    let ctx = IntegrationTestContext::new(&[
        (
            "/work/Directory.Build.props",
            r#"<Project>
                <PropertyGroup>
                    <RepoRoot>$(MSBuildThisFileDirectory)</RepoRoot>
                    <Seen>$(Before)</Seen>
                </PropertyGroup>
            </Project>"#,
        ),
        (
            "/work/src/app.csproj",
            r#"<Project>
                <PropertyGroup><Before>early</Before></PropertyGroup>
                <Import Project="$([MSBuild]::GetPathOfFileAbove('Directory.Build.props', '$(MSBuildProjectDirectory)'))" />
                <PropertyGroup>
                    <Tools>$(RepoRoot)tools</Tools>
                    <Here>$(MSBuildThisFile)</Here>
                </PropertyGroup>
            </Project>"#,
        ),
    ]);

    let evaluation = ctx.evaluate("/work/src/app.csproj").await;
    let props = &evaluation.properties;

    assert_eq!(props.get("Seen"), Some("early"));
    assert_eq!(props.get("Here"), Some("app.csproj"));
    assert_eq!(
        props.get("Tools"),
        Some(format!("/work{}tools", std::path::MAIN_SEPARATOR).as_str())
    );
    assert_eq!(
        evaluation.origins.get("RepoRoot").and_then(|e| e.source()),
        Some(Path::new("/work/Directory.Build.props"))
    );
}

#[tokio::test]
async fn test_malformed_imports_do_not_stop_evaluation() {
    let ctx = IntegrationTestContext::new(&[
        ("/work/broken.props", "<Project><PropertyGroup>"),
        ("/work/wrong.props", "<Wrong />"),
        (
            "/work/app.csproj",
            r#"<Project>
                <Import Project="broken.props" />
                <Import Project="wrong.props" />
                <Import Project="missing.props" />
                <Import Project="$(Undefined)\x.props" />
                <PropertyGroup><Done>yes</Done></PropertyGroup>
            </Project>"#,
        ),
    ]);

    let evaluation = ctx.evaluate("/work/app.csproj").await;
    assert_eq!(evaluation.properties.get("Done"), Some("yes"));
    assert!(evaluation.imports.is_empty());
}

#[rstest]
#[case("'A'=='A'", true)]
#[case("'A'!='B'", true)]
#[case("'A'=='a'", false)]
#[case("1 > 2", false)]
#[case("1 > 2 Or 3 > 2", true)]
#[case("1 < 2 and 2 <= 2", true)]
#[case("!('x' == 'y')", true)]
#[case("'false'", false)]
#[case("HasTrailingSlash('dir/')", true)]
#[case("HasTrailingSlash('dir')", false)]
#[tokio::test]
async fn test_conditions(#[case] condition: &str, #[case] expected: bool) {
    let host = Host::in_memory(Arc::new(MemoryFileSystem::new()));
    let evaluator = ConditionEvaluator::new(&host, Path::new("/"));
    assert_eq!(evaluator.holds(condition).await, expected, "{condition}");
}

#[tokio::test]
async fn test_and_or_evaluate_both_operands() {
    let fs = Arc::new(MemoryFileSystem::new().with_file("/a", ""));
    let host = Host::in_memory(fs.clone());
    let registry = StaticFunctionRegistry::with_builtins();
    let properties = PropertyContext::new();
    let expander =
        octofhir_msbuild::evaluator::PropertyExpander::new(&properties, &registry, &host);

    assert!(!expander.condition("'1' == '2' And Exists('/a')").await);
    assert_eq!(fs.exists_count(), 1);

    assert!(expander.condition("'1' == '1' Or Exists('/b')").await);
    assert_eq!(fs.exists_count(), 2);
}
