use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::api::job::{Job, JobSubmitRequest, JobSubmitRequestItem};
use crate::api::pod::{Container, PodSpec};
use crate::config::SchedulingConfig;
use crate::error::ValidationError;
use crate::util::IdGenerator;

/// Build validated, defaulted job records from a submit request.
///
/// Items are processed in order and the first violation rejects the whole
/// request, so nothing is ever persisted for a partially valid batch.
pub fn build_jobs(
    request: JobSubmitRequest,
    config: &SchedulingConfig,
    owner: &str,
    ownership_groups: &[String],
    created: DateTime<Utc>,
    id_generator: &dyn IdGenerator,
) -> Result<Vec<Job>, ValidationError> {
    let mut jobs = Vec::with_capacity(request.job_request_items.len());

    for (index, mut item) in request.job_request_items.into_iter().enumerate() {
        validate_pod_spec_shape(&item, index, &request.job_set_id)?;

        let namespace = if item.namespace.is_empty() {
            "default".to_string()
        } else {
            item.namespace.clone()
        };

        let pod_specs = item.pod_spec.iter_mut().chain(item.pod_specs.iter_mut());
        for (pod_index, pod_spec) in pod_specs.enumerate() {
            fill_container_requests_and_limits(&mut pod_spec.containers);
            apply_defaults_to_pod_spec(pod_spec, config);
            merge_required_node_labels(pod_spec, &item.required_node_labels);
            validate_pod_spec(pod_spec, config, index, pod_index)?;
        }

        validate_ingress_configs(&item, index)?;

        let job_id = id_generator.next_id();
        enrich_values(&mut item.labels, &job_id);
        enrich_values(&mut item.annotations, &job_id);

        jobs.push(Job {
            id: job_id,
            client_id: item.client_id,
            queue: request.queue.clone(),
            job_set_id: request.job_set_id.clone(),
            namespace,
            labels: item.labels,
            annotations: item.annotations,
            required_node_labels: item.required_node_labels,
            ingress: item.ingress,
            services: item.services,
            priority: item.priority,
            pod_spec: item.pod_spec,
            pod_specs: item.pod_specs,
            created,
            owner: owner.to_string(),
            queue_ownership_user_groups: ownership_groups.to_vec(),
        });
    }

    Ok(jobs)
}

/// An item must carry exactly one of `pod_spec` or `pod_specs`.
fn validate_pod_spec_shape(
    item: &JobSubmitRequestItem,
    index: usize,
    job_set_id: &str,
) -> Result<(), ValidationError> {
    if item.pod_spec.is_some() && !item.pod_specs.is_empty() {
        return Err(ValidationError::BothPodSpecFields {
            index,
            job_set_id: job_set_id.to_string(),
        });
    }
    if item.all_pod_specs().is_empty() {
        return Err(ValidationError::NoPodSpec {
            index,
            job_set_id: job_set_id.to_string(),
        });
    }
    Ok(())
}

/// Mirror limits into missing requests and requests into missing limits,
/// so every resource ends up with both sides present.
pub fn fill_container_requests_and_limits(containers: &mut [Container]) {
    for container in containers {
        let resources = &mut container.resources;

        let missing_requests: Vec<(String, _)> = resources
            .limits
            .0
            .iter()
            .filter(|(resource, _)| !resources.requests.contains(resource))
            .map(|(resource, quantity)| (resource.clone(), quantity.clone()))
            .collect();
        for (resource, quantity) in missing_requests {
            resources.requests.insert(resource, quantity);
        }

        let missing_limits: Vec<(String, _)> = resources
            .requests
            .0
            .iter()
            .filter(|(resource, _)| !resources.limits.contains(resource))
            .map(|(resource, quantity)| (resource.clone(), quantity.clone()))
            .collect();
        for (resource, quantity) in missing_limits {
            resources.limits.insert(resource, quantity);
        }
    }
}

/// Apply the configured resource defaults and tolerations to one pod.
pub fn apply_defaults_to_pod_spec(spec: &mut PodSpec, config: &SchedulingConfig) {
    for container in &mut spec.containers {
        for (resource, quantity) in &config.default_job_limits.0 {
            let has_limit = container.resources.limits.contains(resource);
            let has_request = container.resources.requests.contains(resource);
            if !has_limit && !has_request {
                container
                    .resources
                    .requests
                    .insert(resource.clone(), quantity.clone());
                container
                    .resources
                    .limits
                    .insert(resource.clone(), quantity.clone());
            }
        }
    }

    for default_toleration in &config.default_job_tolerations {
        let already_present = spec.tolerations.iter().any(|toleration| {
            toleration.key == default_toleration.key && default_toleration.matches(toleration)
        });
        if !already_present {
            spec.tolerations.push(default_toleration.clone());
        }
    }
}

/// `required_node_labels` is deprecated; existing callers rely on it being
/// folded into the node selector of every pod.
fn merge_required_node_labels(spec: &mut PodSpec, required: &BTreeMap<String, String>) {
    for (key, value) in required {
        spec.node_selector.insert(key.clone(), value.clone());
    }
}

/// Policy validation of one pod spec after defaulting.
pub fn validate_pod_spec(
    spec: &PodSpec,
    config: &SchedulingConfig,
    index: usize,
    pod_index: usize,
) -> Result<(), ValidationError> {
    if spec.containers.is_empty() {
        return Err(ValidationError::NoContainers { index, pod_index });
    }

    let size = serde_json::to_vec(spec)
        .map(|bytes| bytes.len())
        .unwrap_or_default();
    if size > config.max_pod_size_bytes {
        return Err(ValidationError::PodTooLarge {
            index,
            pod_index,
            size,
            max_size: config.max_pod_size_bytes,
        });
    }

    for (resource, minimum) in &config.min_job_resources.0 {
        for container in &spec.containers {
            let requested = container
                .resources
                .requests
                .get(resource)
                .map(|quantity| quantity.millis())
                .unwrap_or(0);
            if requested < minimum.millis() {
                return Err(ValidationError::RequestBelowMinimum {
                    index,
                    container: container.name.clone(),
                    resource: resource.clone(),
                    got: container
                        .resources
                        .requests
                        .get(resource)
                        .map(|quantity| quantity.to_string())
                        .unwrap_or_else(|| "0".to_string()),
                    min: minimum.to_string(),
                });
            }
        }
    }

    if let Some(priority_class) = &spec.priority_class_name {
        if !config.permitted_priority_classes.is_empty()
            && !config.permitted_priority_classes.contains(priority_class)
        {
            return Err(ValidationError::PriorityClassNotPermitted {
                index,
                priority_class: priority_class.clone(),
            });
        }
    }

    for (key, value) in &config.required_node_selectors {
        if spec.node_selector.get(key) != Some(value) {
            return Err(ValidationError::MissingRequiredNodeSelector {
                index,
                pod_index,
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    Ok(())
}

/// Ingress port lists must be non-empty and no port may appear in two
/// ingress configurations of the same item.
fn validate_ingress_configs(
    item: &JobSubmitRequestItem,
    index: usize,
) -> Result<(), ValidationError> {
    let mut seen_ports: BTreeMap<u32, usize> = BTreeMap::new();

    for (ingress_index, ingress) in item.ingress.iter().enumerate() {
        if ingress.ports.is_empty() {
            return Err(ValidationError::IngressWithoutPorts {
                index,
                ingress_index,
            });
        }
        for &port in &ingress.ports {
            if let Some(&first) = seen_ports.get(&port) {
                return Err(ValidationError::DuplicateIngressPort {
                    index,
                    port,
                    first,
                    second: ingress_index,
                });
            }
            seen_ports.insert(port, ingress_index);
        }
    }
    Ok(())
}

/// Replace `{JobId}` in label and annotation values with the minted id.
/// `{{JobId}}` is the escape form and round-trips to the literal `JobId`.
fn enrich_values(values: &mut BTreeMap<String, String>, job_id: &str) {
    // The marker cannot occur in user input, so the escape survives the
    // id substitution unharmed.
    const ESCAPE_MARKER: &str = "\u{1}";
    for value in values.values_mut() {
        *value = value
            .replace("{{JobId}}", ESCAPE_MARKER)
            .replace("{JobId}", job_id)
            .replace(ESCAPE_MARKER, "JobId");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pod::{Quantity, ResourceList, Toleration, TolerationOperator};

    fn container(requests: ResourceList, limits: ResourceList) -> Container {
        Container {
            name: "main".to_string(),
            image: "busybox".to_string(),
            resources: crate::api::pod::ResourceRequirements { requests, limits },
            ports: Vec::new(),
        }
    }

    fn quantity(text: &str) -> Quantity {
        text.parse().unwrap()
    }

    #[test]
    fn test_fill_requests_and_limits_is_symmetric() {
        let mut containers = vec![container(
            ResourceList::from([("memory", quantity("1Gi"))]),
            ResourceList::from([("cpu", quantity("2"))]),
        )];

        fill_container_requests_and_limits(&mut containers);

        let resources = &containers[0].resources;
        assert_eq!(resources.requests.get("cpu"), Some(&quantity("2")));
        assert_eq!(resources.requests.get("memory"), Some(&quantity("1Gi")));
        assert_eq!(resources.limits.get("cpu"), Some(&quantity("2")));
        assert_eq!(resources.limits.get("memory"), Some(&quantity("1Gi")));
    }

    #[test]
    fn test_defaults_fill_only_absent_resources() {
        let config = SchedulingConfig {
            default_job_limits: ResourceList::from([
                ("cpu", quantity("1")),
                ("memory", quantity("1Gi")),
            ]),
            ..SchedulingConfig::default()
        };
        let mut spec = PodSpec {
            containers: vec![container(
                ResourceList::new(),
                ResourceList::from([("cpu", quantity("2"))]),
            )],
            ..PodSpec::default()
        };

        fill_container_requests_and_limits(&mut spec.containers);
        apply_defaults_to_pod_spec(&mut spec, &config);

        let resources = &spec.containers[0].resources;
        // cpu was present as a limit, so the default must not touch it.
        assert_eq!(resources.requests.get("cpu"), Some(&quantity("2")));
        assert_eq!(resources.limits.get("cpu"), Some(&quantity("2")));
        assert_eq!(resources.requests.get("memory"), Some(&quantity("1Gi")));
        assert_eq!(resources.limits.get("memory"), Some(&quantity("1Gi")));
    }

    #[test]
    fn test_default_tolerations_appended_when_missing() {
        let default_toleration = Toleration {
            key: "batch-only".to_string(),
            operator: TolerationOperator::Exists,
            value: String::new(),
            effect: None,
        };
        let config = SchedulingConfig {
            default_job_tolerations: vec![default_toleration.clone()],
            ..SchedulingConfig::default()
        };

        let mut spec = PodSpec::default();
        apply_defaults_to_pod_spec(&mut spec, &config);
        assert_eq!(spec.tolerations, vec![default_toleration.clone()]);

        // Applying again must not duplicate it.
        apply_defaults_to_pod_spec(&mut spec, &config);
        assert_eq!(spec.tolerations.len(), 1);
    }

    #[test]
    fn test_min_job_resources_enforced() {
        let config = SchedulingConfig {
            min_job_resources: ResourceList::from([("memory", quantity("64Mi"))]),
            ..SchedulingConfig::default()
        };
        let spec = PodSpec {
            containers: vec![container(
                ResourceList::from([("memory", quantity("1Mi"))]),
                ResourceList::new(),
            )],
            ..PodSpec::default()
        };

        let err = validate_pod_spec(&spec, &config, 0, 0).unwrap_err();
        assert!(matches!(err, ValidationError::RequestBelowMinimum { .. }));
    }

    #[test]
    fn test_priority_class_restriction() {
        let config = SchedulingConfig {
            permitted_priority_classes: ["batch-low".to_string()].into(),
            ..SchedulingConfig::default()
        };

        let mut spec = PodSpec {
            containers: vec![container(ResourceList::new(), ResourceList::new())],
            priority_class_name: Some("cluster-critical".to_string()),
            ..PodSpec::default()
        };
        assert!(matches!(
            validate_pod_spec(&spec, &config, 0, 0),
            Err(ValidationError::PriorityClassNotPermitted { .. })
        ));

        spec.priority_class_name = Some("batch-low".to_string());
        assert!(validate_pod_spec(&spec, &config, 0, 0).is_ok());
    }

    #[test]
    fn test_ingress_port_rules() {
        let mut item = JobSubmitRequestItem {
            pod_spec: Some(PodSpec::default()),
            ingress: vec![crate::api::ingress::IngressConfig {
                ports: Vec::new(),
                ..Default::default()
            }],
            ..JobSubmitRequestItem::default()
        };
        assert!(matches!(
            validate_ingress_configs(&item, 0),
            Err(ValidationError::IngressWithoutPorts { .. })
        ));

        item.ingress = vec![
            crate::api::ingress::IngressConfig {
                ports: vec![8080],
                ..Default::default()
            },
            crate::api::ingress::IngressConfig {
                ports: vec![8080],
                ..Default::default()
            },
        ];
        assert!(matches!(
            validate_ingress_configs(&item, 0),
            Err(ValidationError::DuplicateIngressPort { port: 8080, .. })
        ));
    }

    #[test]
    fn test_enrich_values_substitutes_and_escapes() {
        let mut values = BTreeMap::from([
            ("plain".to_string(), "id-{JobId}-suffix".to_string()),
            ("escaped".to_string(), "{{JobId}}".to_string()),
            ("mixed".to_string(), "{{JobId}}-{JobId}".to_string()),
            ("untouched".to_string(), "nothing here".to_string()),
        ]);

        enrich_values(&mut values, "01abc");

        assert_eq!(values["plain"], "id-01abc-suffix");
        assert_eq!(values["escaped"], "JobId");
        assert_eq!(values["mixed"], "JobId-01abc");
        assert_eq!(values["untouched"], "nothing here");
    }
}
