use tracing::{info, warn};

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::service::{parse_lite_rule, LiteRule, VpcService};
use crate::state::ResourceData;

pub struct SecurityGroupLiteRuleResource;

fn parse_rules(rules: &[String]) -> Result<Vec<LiteRule>, ProviderError> {
    rules.iter().map(|r| parse_lite_rule(r)).collect()
}

fn render(rules: &[LiteRule]) -> Vec<String> {
    rules.iter().map(ToString::to_string).collect()
}

impl SecurityGroupLiteRuleResource {
    async fn apply(&self, svc: &VpcService, sg_id: &str, d: &ResourceData) -> Result<(), ProviderError> {
        let ingress = parse_rules(&d.get_string_list("ingress"))?;
        let egress = parse_rules(&d.get_string_list("egress"))?;
        if ingress.is_empty() && egress.is_empty() {
            return svc.clear_lite_rules(sg_id).await;
        }
        svc.set_lite_rules(sg_id, &ingress, &egress).await?;
        info!(security_group_id = sg_id, ingress = ingress.len(), egress = egress.len(), "set lite rules");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Resource for SecurityGroupLiteRuleResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_security_group_lite_rule"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to manage every policy of a security group in the lite rule form.")
            .with_attribute(
                "security_group_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the security group."),
            )
            .with_attribute(
                "ingress",
                Attribute::optional_string_list()
                    .with_description("Ingress rules, each like `ACTION#CIDR_IP#PORT#PROTOCOL`."),
            )
            .with_attribute(
                "egress",
                Attribute::optional_string_list()
                    .with_description("Egress rules, each like `ACTION#CIDR_IP#PORT#PROTOCOL`."),
            )
    }

    fn validate(&self, config: &ResourceData) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for key in ["ingress", "egress"] {
            for (i, rule) in config.get_string_list(key).iter().enumerate() {
                if let Err(e) = parse_lite_rule(rule) {
                    diagnostics.push(
                        Diagnostic::error(e.to_string()).with_attribute(format!("{}[{}]", key, i)),
                    );
                }
            }
        }
        diagnostics
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let sg_id = d.require_str("security_group_id")?.to_string();
        self.apply(svc, &sg_id, d).await?;
        d.set_id(sg_id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some((ingress, egress)) = svc.describe_lite_rules(&id).await? else {
            warn!(security_group_id = %id, "security group not found");
            return Ok(false);
        };

        d.set("security_group_id", id);
        d.set("ingress", render(&ingress));
        d.set("egress", render(&egress));
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if d.has_changes(prior, &["ingress", "egress"]) {
            let id = d.require_id()?.to_string();
            self.apply(svc, &id, d).await?;
        }
        Ok(())
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.clear_lite_rules(d.require_id()?).await
    }
}
