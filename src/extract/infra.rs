// promptforge — Shallow infrastructure scrapers
//
// Each scraper reads one configuration file and produces titled
// infrastructure sections ready to merge into the store.

use crate::artifact::{InfrastructureSection, SectionType};
use crate::error::ExtractError;
use regex::Regex;
use serde_json::Value as Json;
use serde_yaml::Value as Yaml;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::path::Path;
use std::sync::OnceLock;

pub const CICD_TITLE: &str = "CI/CD Pipeline";
pub const CONTAINER_TITLE: &str = "Container Image";
pub const DEPLOYMENT_TITLE: &str = "Deployment Infrastructure";
pub const COMPOSE_TITLE: &str = "Docker Compose Services";
pub const COMPUTE_TITLE: &str = "Compute Resources";
pub const STORAGE_TITLE: &str = "Storage Infrastructure";
pub const NETWORKING_TITLE: &str = "Networking Infrastructure";
pub const ECS_TITLE: &str = "ECS Task Definition";
pub const CLOUDFORMATION_TITLE: &str = "CloudFormation Stack";

/// GitLab CI keys that are not jobs.
const GITLAB_RESERVED: &[&str] = &[
    "stages", "variables", "before_script", "after_script", "include", "default", "workflow",
    "image", "services", "cache",
];

/// Terraform attributes worth surfacing, in display order.
const TF_ATTRIBUTES: &[&str] = &[
    "instance_type", "engine", "engine_version", "runtime", "cidr_block", "bucket", "image_id",
    "launch_type", "name",
];

async fn read(path: &Path) -> Result<String, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.display().to_string()));
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

fn parse_error(format: &str, err: impl std::fmt::Display) -> ExtractError {
    ExtractError::Parse {
        format: format.to_string(),
        message: err.to_string(),
    }
}

fn keywords(terms: impl IntoIterator<Item = String>) -> Vec<String> {
    terms
        .into_iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// Terraform state
// ---------------------------------------------------------------------------

pub async fn scrape_terraform_state(path: &Path) -> Result<Vec<InfrastructureSection>, ExtractError> {
    parse_terraform_state(&read(path).await?)
}

fn terraform_category(resource_type: &str) -> SectionType {
    const NETWORKING: &[&str] = &["vpc", "subnet", "security_group", "route", "lb", "alb", "elb", "gateway", "eip", "dns", "cloudfront"];
    const STORAGE: &[&str] = &["db", "rds", "s3", "dynamodb", "elasticache", "efs", "ebs", "redshift", "sql", "storage"];
    const DEPLOYMENT: &[&str] = &["ecs", "ecr", "eks", "kubernetes", "helm", "container"];

    let parts: Vec<&str> = resource_type.split('_').collect();
    let has = |terms: &[&str]| terms.iter().any(|t| parts.contains(t) || resource_type.contains(&format!("_{}", t)));
    if has(DEPLOYMENT) {
        SectionType::Deployment
    } else if has(STORAGE) {
        SectionType::Storage
    } else if has(NETWORKING) {
        SectionType::Networking
    } else {
        SectionType::Compute
    }
}

/// One section per resource category present in the state.
pub fn parse_terraform_state(text: &str) -> Result<Vec<InfrastructureSection>, ExtractError> {
    let state: Json = serde_json::from_str(text).map_err(|e| parse_error("terraform state", e))?;
    let resources = state
        .get("resources")
        .and_then(|r| r.as_array())
        .cloned()
        .unwrap_or_default();

    let mut groups: BTreeMap<&'static str, (SectionType, String, Vec<String>)> = BTreeMap::new();
    for resource in &resources {
        if resource.get("mode").and_then(|m| m.as_str()) == Some("data") {
            continue;
        }
        let rtype = resource.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
        let name = resource.get("name").and_then(|n| n.as_str()).unwrap_or("unknown");
        let section_type = terraform_category(rtype);
        let title = match section_type {
            SectionType::Deployment => DEPLOYMENT_TITLE,
            SectionType::Storage => STORAGE_TITLE,
            SectionType::Networking => NETWORKING_TITLE,
            _ => COMPUTE_TITLE,
        };

        let instances = resource
            .get("instances")
            .and_then(|i| i.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut details = Vec::new();
        if let Some(attrs) = instances.first().and_then(|i| i.get("attributes")) {
            for key in TF_ATTRIBUTES {
                if let Some(v) = attrs.get(*key).and_then(|v| v.as_str()) {
                    details.push(format!("{}: {}", key, v));
                }
            }
        }

        let entry = groups
            .entry(title)
            .or_insert_with(|| (section_type, String::new(), Vec::new()));
        let _ = write!(entry.1, "- `{}.{}`", rtype, name);
        if instances.len() > 1 {
            let _ = write!(entry.1, " ({} instances)", instances.len());
        }
        if !details.is_empty() {
            let _ = write!(entry.1, " ({})", details.join(", "));
        }
        entry.1.push('\n');
        entry.2.extend(rtype.split('_').filter(|p| p.len() > 2).map(str::to_string));
    }

    Ok(groups
        .into_iter()
        .map(|(title, (section_type, content, terms))| InfrastructureSection {
            title: title.to_string(),
            section_type,
            content: format!("Terraform-managed resources:\n{}", content),
            keywords: keywords(terms.into_iter().chain(["terraform".to_string()])),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// GitLab CI
// ---------------------------------------------------------------------------

pub async fn scrape_gitlab_ci(path: &Path) -> Result<InfrastructureSection, ExtractError> {
    parse_gitlab_ci(&read(path).await?)
}

fn yaml_str(value: Option<&Yaml>) -> Option<String> {
    match value? {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Mapping(m) => m.get("name").and_then(|n| n.as_str()).map(str::to_string),
        _ => None,
    }
}

pub fn parse_gitlab_ci(text: &str) -> Result<InfrastructureSection, ExtractError> {
    let doc: Yaml = serde_yaml::from_str(text).map_err(|e| parse_error("gitlab ci", e))?;
    let Some(root) = doc.as_mapping() else {
        return Err(parse_error("gitlab ci", "top level is not a mapping"));
    };

    let stages: Vec<String> = root
        .get("stages")
        .and_then(|s| s.as_sequence())
        .map(|seq| seq.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let mut content = String::new();
    let mut terms = vec!["gitlab".to_string(), "pipeline".to_string()];
    if !stages.is_empty() {
        let _ = writeln!(content, "**Stages:** {}\n", stages.join(", "));
        terms.extend(stages.iter().cloned());
    }
    if let Some(image) = yaml_str(root.get("image")) {
        let _ = writeln!(content, "**Default image:** {}\n", image);
    }

    let mut jobs = String::new();
    for (key, value) in root {
        let Some(name) = key.as_str() else { continue };
        if GITLAB_RESERVED.contains(&name) || name.starts_with('.') {
            continue;
        }
        let Some(job) = value.as_mapping() else { continue };
        let stage = job.get("stage").and_then(|s| s.as_str()).unwrap_or("test");
        let _ = write!(jobs, "- `{}` (stage: {}", name, stage);
        if let Some(image) = yaml_str(job.get("image")) {
            let _ = write!(jobs, ", image: {}", image);
            terms.push(image.split([':', '/']).next().unwrap_or_default().to_string());
        }
        if let Some(env) = yaml_str(job.get("environment")) {
            let _ = write!(jobs, ", environment: {}", env);
            terms.push(env);
        }
        jobs.push_str(")\n");
        terms.push(name.to_string());
    }
    if !jobs.is_empty() {
        let _ = write!(content, "**Jobs:**\n{}", jobs);
    }

    Ok(InfrastructureSection {
        title: CICD_TITLE.to_string(),
        section_type: SectionType::Cicd,
        content: content.trim_end().to_string(),
        keywords: keywords(terms),
    })
}

// ---------------------------------------------------------------------------
// Dockerfile
// ---------------------------------------------------------------------------

pub async fn scrape_dockerfile(path: &Path) -> Result<InfrastructureSection, ExtractError> {
    parse_dockerfile(&read(path).await?)
}

fn instruction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(FROM|EXPOSE|ENV|VOLUME|WORKDIR|USER|CMD|ENTRYPOINT)\s+(.+?)\s*$")
            .unwrap_or_else(|e| panic!("invalid dockerfile regex: {e}"))
    })
}

pub fn parse_dockerfile(text: &str) -> Result<InfrastructureSection, ExtractError> {
    let mut base_images = Vec::new();
    let mut lines = Vec::new();
    let mut terms = vec!["docker".to_string(), "container".to_string()];

    for line in text.lines() {
        let Some(caps) = instruction_re().captures(line) else { continue };
        let instruction = caps[1].to_uppercase();
        let arg = caps[2].to_string();
        match instruction.as_str() {
            "FROM" => {
                let image = arg.split_whitespace().next().unwrap_or_default().to_string();
                terms.push(image.split([':', '/', '@']).next().unwrap_or_default().to_string());
                base_images.push(image);
            }
            "EXPOSE" => lines.push(format!("**Exposed ports:** {}", arg)),
            "ENV" => lines.push(format!("**Env:** {}", arg)),
            "VOLUME" => lines.push(format!("**Volume:** {}", arg)),
            "WORKDIR" => lines.push(format!("**Workdir:** {}", arg)),
            "USER" => lines.push(format!("**User:** {}", arg)),
            _ => lines.push(format!("**{}:** `{}`", instruction.to_lowercase(), arg)),
        }
    }

    if base_images.is_empty() {
        return Err(parse_error("dockerfile", "no FROM instruction"));
    }
    let stage_note = if base_images.len() > 1 { " (multi-stage)" } else { "" };
    let mut content = format!("**Base image{}:** {}\n", stage_note, base_images.join(", "));
    for line in lines {
        content.push_str(&line);
        content.push('\n');
    }

    Ok(InfrastructureSection {
        title: CONTAINER_TITLE.to_string(),
        section_type: SectionType::Deployment,
        content: content.trim_end().to_string(),
        keywords: keywords(terms),
    })
}

// ---------------------------------------------------------------------------
// docker-compose
// ---------------------------------------------------------------------------

pub async fn scrape_compose(path: &Path) -> Result<InfrastructureSection, ExtractError> {
    parse_compose(&read(path).await?)
}

fn yaml_list(value: Option<&Yaml>) -> Vec<String> {
    match value {
        Some(Yaml::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| match v {
                Yaml::String(s) => Some(s.clone()),
                Yaml::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        // depends_on in long form is a mapping keyed by service name
        Some(Yaml::Mapping(m)) => m.keys().filter_map(|k| k.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

pub fn parse_compose(text: &str) -> Result<InfrastructureSection, ExtractError> {
    let doc: Yaml = serde_yaml::from_str(text).map_err(|e| parse_error("docker-compose", e))?;
    let services = doc
        .get("services")
        .and_then(|s| s.as_mapping())
        .ok_or_else(|| parse_error("docker-compose", "no services defined"))?;

    let mut content = String::from("**Services:**\n");
    let mut terms = vec!["docker".to_string(), "compose".to_string()];
    for (name, service) in services {
        let Some(name) = name.as_str() else { continue };
        terms.push(name.to_string());
        let _ = write!(content, "- `{}`", name);
        if let Some(image) = service.get("image").and_then(|i| i.as_str()) {
            let _ = write!(content, " image: {}", image);
            terms.push(image.split([':', '/']).next().unwrap_or_default().to_string());
        } else if service.get("build").is_some() {
            content.push_str(" built from source");
        }
        let ports = yaml_list(service.get("ports"));
        if !ports.is_empty() {
            let _ = write!(content, "; ports: {}", ports.join(", "));
        }
        let deps = yaml_list(service.get("depends_on"));
        if !deps.is_empty() {
            let _ = write!(content, "; depends on: {}", deps.join(", "));
        }
        content.push('\n');
    }

    Ok(InfrastructureSection {
        title: COMPOSE_TITLE.to_string(),
        section_type: SectionType::Deployment,
        content: content.trim_end().to_string(),
        keywords: keywords(terms),
    })
}

// ---------------------------------------------------------------------------
// ECS task definition
// ---------------------------------------------------------------------------

pub async fn scrape_ecs_task_definition(path: &Path) -> Result<InfrastructureSection, ExtractError> {
    parse_ecs_task_definition(&read(path).await?)
}

pub fn parse_ecs_task_definition(text: &str) -> Result<InfrastructureSection, ExtractError> {
    let def: Json = serde_json::from_str(text).map_err(|e| parse_error("ecs task definition", e))?;
    let field = |key: &str| match def.get(key) {
        Some(Json::String(s)) => Some(s.clone()),
        Some(Json::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let family = field("family").ok_or_else(|| parse_error("ecs task definition", "missing family"))?;

    let mut content = format!("**Family:** {}\n", family);
    let mut terms = vec!["ecs".to_string(), "task".to_string(), "aws".to_string(), family.clone()];
    let launch: Vec<String> = def
        .get("requiresCompatibilities")
        .and_then(|c| c.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    if !launch.is_empty() {
        let _ = writeln!(content, "**Launch type:** {}", launch.join(", "));
        terms.extend(launch);
    }
    for (label, key) in [("Network mode", "networkMode"), ("CPU", "cpu"), ("Memory", "memory")] {
        if let Some(v) = field(key) {
            let _ = writeln!(content, "**{}:** {}", label, v);
        }
    }

    let containers = def
        .get("containerDefinitions")
        .and_then(|c| c.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    if !containers.is_empty() {
        content.push_str("**Containers:**\n");
    }
    for container in containers {
        let name = container.get("name").and_then(|n| n.as_str()).unwrap_or("unnamed");
        let _ = write!(content, "- `{}`", name);
        if let Some(image) = container.get("image").and_then(|i| i.as_str()) {
            let _ = write!(content, " image: {}", image);
            terms.push(image.rsplit('/').next().unwrap_or(image).split(':').next().unwrap_or_default().to_string());
        }
        let ports: Vec<String> = container
            .get("portMappings")
            .and_then(|p| p.as_array())
            .map(|a| a.iter().filter_map(|m| m.get("containerPort").map(|p| p.to_string())).collect())
            .unwrap_or_default();
        if !ports.is_empty() {
            let _ = write!(content, "; ports: {}", ports.join(", "));
        }
        content.push('\n');
        terms.push(name.to_string());
    }

    Ok(InfrastructureSection {
        title: ECS_TITLE.to_string(),
        section_type: SectionType::Deployment,
        content: content.trim_end().to_string(),
        keywords: keywords(terms),
    })
}

// ---------------------------------------------------------------------------
// CloudFormation
// ---------------------------------------------------------------------------

pub async fn scrape_cloudformation(path: &Path) -> Result<InfrastructureSection, ExtractError> {
    parse_cloudformation(&read(path).await?)
}

/// YAML or JSON template. Resources are listed by logical id and type.
pub fn parse_cloudformation(text: &str) -> Result<InfrastructureSection, ExtractError> {
    // JSON templates are valid YAML; intrinsic tags (!Ref, !Sub) load as tagged values.
    let doc: Yaml = serde_yaml::from_str(text).map_err(|e| parse_error("cloudformation", e))?;
    let resources = doc
        .get("Resources")
        .and_then(|r| r.as_mapping())
        .ok_or_else(|| parse_error("cloudformation", "no Resources defined"))?;

    let mut content = String::new();
    if let Some(desc) = doc.get("Description").and_then(|d| d.as_str()) {
        let _ = writeln!(content, "**Description:** {}\n", desc.trim());
    }
    let _ = writeln!(content, "**Resources ({}):**", resources.len());
    let mut terms = vec!["cloudformation".to_string(), "aws".to_string()];
    for (id, resource) in resources {
        let Some(id) = id.as_str() else { continue };
        let rtype = resource.get("Type").and_then(|t| t.as_str()).unwrap_or("unknown");
        let _ = writeln!(content, "- `{}` ({})", id, rtype);
        // AWS::ECS::Service -> ecs, service
        terms.extend(rtype.split("::").skip(1).map(str::to_string));
    }
    if let Some(outputs) = doc.get("Outputs").and_then(|o| o.as_mapping()) {
        let names: Vec<&str> = outputs.keys().filter_map(|k| k.as_str()).collect();
        if !names.is_empty() {
            let _ = write!(content, "\n**Outputs:** {}", names.join(", "));
        }
    }

    Ok(InfrastructureSection {
        title: CLOUDFORMATION_TITLE.to_string(),
        section_type: SectionType::Deployment,
        content: content.trim_end().to_string(),
        keywords: keywords(terms),
    })
}
