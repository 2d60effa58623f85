//! Per-stage document copies from the template catalog

use crate::clients::drive::DocumentStore;
use crate::error::{FlowError, FlowResult};
use crate::handlers::{publish_result, StageHandler};
use crate::notify::{component, Attributes, HandlerKind, Notification, PublishReceipt};
use crate::pipeline::stage::Stage;
use crate::services::Services;
use crate::store::folders::FolderIds;
use crate::store::templates::ids_by_tag;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Month the fiscal year starts in
pub const FISCAL_START_MONTH: u32 = 4;

/// Fiscal quarter (1-4) of a date
pub fn fiscal_quarter(date: NaiveDate) -> u32 {
    (date.month() + 12 - FISCAL_START_MONTH) % 12 / 3 + 1
}

/// Where a copied document lands within the project's folder layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    AccountRoot,
    SalesProject,
    Sales(&'static str),
    Delivery(&'static str),
}

impl Destination {
    pub fn resolve<'a>(&self, folders: &'a FolderIds) -> Option<&'a str> {
        let id = match self {
            Destination::AccountRoot => folders.account_folder.root_id.as_str(),
            Destination::SalesProject => folders.sales_folder.project_id.as_str(),
            Destination::Sales(name) => folders.sales_folder.sub_folder(name)?,
            Destination::Delivery(name) => folders.delivery_folder.sub_folder(name)?,
        };
        (!id.is_empty()).then_some(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSpec {
    pub title: String,
    pub tag: String,
    pub destination: Destination,
    /// Key of the copied link in the result payload
    pub field_name: &'static str,
}

impl DocumentSpec {
    fn new(
        title: String,
        tag: impl Into<String>,
        destination: Destination,
        field_name: &'static str,
    ) -> Self {
        Self {
            title,
            tag: tag.into(),
            destination,
            field_name,
        }
    }
}

/// Values substituted into document titles
#[derive(Debug, Clone)]
pub struct DocumentContext<'a> {
    pub customer: &'a str,
    pub project: &'a str,
    pub solution_program: Option<&'a str>,
    pub today: NaiveDate,
}

/// The documents a stage produces; stages without documents yield an empty list
pub fn stage_documents(stage: Stage, ctx: &DocumentContext<'_>) -> FlowResult<Vec<DocumentSpec>> {
    let (customer, project) = (ctx.customer, ctx.project);

    let docs = match stage {
        Stage::LeadIn => vec![
            DocumentSpec::new(
                format!(
                    "{}_Account_Plan_Q{}_{}",
                    customer,
                    fiscal_quarter(ctx.today),
                    ctx.today.format("%Y")
                ),
                "AccountPlan",
                Destination::AccountRoot,
                "AccountPlanLink",
            ),
            DocumentSpec::new(
                format!("{}_{}_Risk Log", customer, project),
                "RiskLog",
                Destination::SalesProject,
                "RiskLogLink",
            ),
            DocumentSpec::new(
                "Add New APN Opportunity".to_string(),
                "APNPortalOpp",
                Destination::Sales("APN Portal Admin"),
                "APNPortalOppLink",
            ),
        ],
        Stage::LeadValidation => vec![DocumentSpec::new(
            "Pre-KickOff Project Notes".to_string(),
            "KickOffNotes",
            Destination::Sales("Meeting_Notes"),
            "KickOffNotesLink",
        )],
        Stage::SolutionDevelopment => {
            let program = ctx
                .solution_program
                .map(str::trim_end)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| FlowError::malformed("solution program is not set on the deal"))?;
            vec![DocumentSpec::new(
                format!("{} - {}", program, customer),
                program.replace(' ', ""),
                Destination::Sales("Deliverables"),
                "SolutionProgramLink",
            )]
        }
        Stage::ProposalDevelopment => vec![DocumentSpec::new(
            format!(
                "{}_AWS_{}_{}_SOW",
                customer,
                project,
                ctx.today.format("%m%d%Y")
            ),
            "SOW",
            Destination::Sales("SOW"),
            "SOWLink",
        )],
        Stage::Negotiation => Vec::new(),
        Stage::DealClosure => vec![
            DocumentSpec::new(
                format!(
                    "{}-{}_Weekly_Status_Report_{}",
                    customer,
                    project,
                    ctx.today.format("%m-%d-%Y")
                ),
                "WeeklyStatusReport",
                Destination::Delivery("Weekly_Action_Reports"),
                "WeeklyStatusReportLink",
            ),
            DocumentSpec::new(
                "Engagement_Data".to_string(),
                "EngagementDataPoints",
                Destination::Delivery("Engagement_Data_Reports"),
                "EngagementDataPointsLink",
            ),
        ],
    };

    Ok(docs)
}

/// A document resolved to its template and destination folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    pub spec: DocumentSpec,
    pub template_id: String,
    pub folder_id: String,
}

pub fn plan_copies(
    stage: Stage,
    specs: Vec<DocumentSpec>,
    folders: &FolderIds,
    templates: &HashMap<String, String>,
) -> FlowResult<Vec<PlannedCopy>> {
    specs
        .into_iter()
        .map(|spec| {
            let template_id = templates
                .get(&spec.tag)
                .cloned()
                .ok_or_else(|| FlowError::TemplateMissing {
                    stage: stage.to_string(),
                    tag: spec.tag.clone(),
                })?;
            let folder_id = spec
                .destination
                .resolve(folders)
                .map(str::to_string)
                .ok_or_else(|| {
                    FlowError::malformed(format!(
                        "no {:?} folder recorded for '{}'",
                        spec.destination, spec.title
                    ))
                })?;
            Ok(PlannedCopy {
                spec,
                template_id,
                folder_id,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CopyRequest {
    customer_name: String,
    project_name: String,
    deal_id: i64,
    #[serde(default)]
    territory: Value,
    #[serde(default)]
    solution_program: Value,
    #[serde(default)]
    folder_ids: Option<FolderIds>,
}

/// Result payload of a copy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CopiedFiles {
    pub customer_name: String,
    pub project_name: String,
    pub deal_id: i64,
    #[serde(default)]
    pub territory: Value,
    #[serde(default)]
    pub solution_program: Value,
    #[serde(default)]
    pub folder_ids: Option<FolderIds>,
    #[serde(default)]
    pub copied_file_links: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_request_link: Option<String>,
}

pub struct DocumentHandler {
    services: Services,
}

impl DocumentHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    async fn folder_missing(&self, request: &CopyRequest, links: Map<String, Value>) -> FlowError {
        let payload = CopiedFiles {
            customer_name: request.customer_name.clone(),
            project_name: request.project_name.clone(),
            deal_id: request.deal_id,
            territory: request.territory.clone(),
            solution_program: request.solution_program.clone(),
            folder_ids: None,
            copied_file_links: links,
            resource_request_link: None,
        };
        let attributes = Attributes::new(component::GDRIVE, "folder_missing", "error");
        if let Err(e) = publish_result(&self.services, &payload, attributes).await {
            warn!("Could not report missing folders: {}", e);
        }

        FlowError::FoldersMissing {
            customer: request.customer_name.clone(),
            project: request.project_name.clone(),
        }
    }

    /// Copies each planned document unless a file with its title already exists
    async fn copy_all(
        &self,
        request: &CopyRequest,
        plan: Vec<PlannedCopy>,
    ) -> FlowResult<Map<String, Value>> {
        let documents: &dyn DocumentStore = self.services.documents.as_ref();
        let mut links = Map::new();
        let mut failed = 0;

        for copy in plan {
            let title = &copy.spec.title;
            let existing = documents
                .list_children(&copy.folder_id)
                .await?
                .into_iter()
                .find(|file| !file.is_folder() && &file.name == title);

            if let Some(file) = existing {
                debug!("'{}' already exists, keeping {}", title, file.id);
                links.insert(copy.spec.field_name.to_string(), Value::String(file.web_link()));
                continue;
            }

            match documents
                .copy_file(&copy.template_id, title, &copy.folder_id)
                .await
            {
                Ok(file) => {
                    links.insert(copy.spec.field_name.to_string(), Value::String(file.web_link()));
                }
                Err(e) if e.is_not_found() => {
                    error!("Copy of '{}' hit a missing file: {}", title, e);
                    return Err(self.folder_missing(request, links).await);
                }
                Err(e) => {
                    error!("Failed to copy '{}': {}", title, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            warn!("{} document(s) were not copied", failed);
        }
        Ok(links)
    }
}

#[async_trait]
impl StageHandler for DocumentHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CopyFiles
    }

    async fn handle(&self, notification: &Notification) -> FlowResult<PublishReceipt> {
        let stage = notification.attributes.pipeline_stage()?;
        let request: CopyRequest = notification.decode()?;

        let recorded = match (stage, &request.folder_ids) {
            (Stage::LeadIn, Some(ids)) => Some(ids.clone()),
            _ => {
                self.services
                    .folders
                    .folders(&request.customer_name, &request.project_name)
                    .await?
            }
        };
        let Some(folder_ids) = recorded else {
            return Err(self.folder_missing(&request, Map::new()).await);
        };

        let templates = self.services.templates.templates_for(stage.as_str()).await?;
        let ctx = DocumentContext {
            customer: &request.customer_name,
            project: &request.project_name,
            solution_program: request.solution_program.as_str(),
            today: Local::now().date_naive(),
        };
        let specs = stage_documents(stage, &ctx)?;
        let plan = plan_copies(stage, specs, &folder_ids, &ids_by_tag(&templates))?;

        let links = self.copy_all(&request, plan).await?;
        info!(
            "Copied {} document link(s) for {} - {} at {}",
            links.len(),
            request.customer_name,
            request.project_name,
            stage
        );

        let resource_request_link = if stage == Stage::ProposalDevelopment {
            let secret = &self.services.config.resource_request_secret;
            Some(self.services.secrets.secret(secret).await?)
        } else {
            None
        };

        let payload = CopiedFiles {
            customer_name: request.customer_name,
            project_name: request.project_name,
            deal_id: request.deal_id,
            territory: request.territory,
            solution_program: request.solution_program,
            folder_ids: Some(folder_ids),
            copied_file_links: links,
            resource_request_link,
        };
        let attributes = Attributes::new(component::GDRIVE, "copy_files", stage.as_str());
        publish_result(&self.services, &payload, attributes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::folders::{AccountFolder, AreaFolders};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx(today: NaiveDate) -> DocumentContext<'static> {
        DocumentContext {
            customer: "Acme",
            project: "Migration",
            solution_program: Some("DevOps Program "),
            today,
        }
    }

    #[test]
    fn test_fiscal_quarters_start_in_april() {
        assert_eq!(fiscal_quarter(date(2026, 4, 1)), 1);
        assert_eq!(fiscal_quarter(date(2026, 6, 30)), 1);
        assert_eq!(fiscal_quarter(date(2026, 7, 1)), 2);
        assert_eq!(fiscal_quarter(date(2026, 12, 31)), 3);
        assert_eq!(fiscal_quarter(date(2027, 1, 15)), 4);
        assert_eq!(fiscal_quarter(date(2027, 3, 31)), 4);
    }

    #[test]
    fn test_lead_in_titles() {
        let docs = stage_documents(Stage::LeadIn, &ctx(date(2026, 10, 19))).unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Acme_Account_Plan_Q3_2026",
                "Acme_Migration_Risk Log",
                "Add New APN Opportunity"
            ]
        );
        assert_eq!(docs[2].destination, Destination::Sales("APN Portal Admin"));
    }

    #[test]
    fn test_dated_titles() {
        let today = date(2026, 3, 5);
        let sow = stage_documents(Stage::ProposalDevelopment, &ctx(today)).unwrap();
        assert_eq!(sow[0].title, "Acme_AWS_Migration_03052026_SOW");

        let closure = stage_documents(Stage::DealClosure, &ctx(today)).unwrap();
        assert_eq!(
            closure[0].title,
            "Acme-Migration_Weekly_Status_Report_03-05-2026"
        );
        assert_eq!(closure[1].field_name, "EngagementDataPointsLink");
    }

    #[test]
    fn test_solution_program_tag_strips_spaces() {
        let docs = stage_documents(Stage::SolutionDevelopment, &ctx(date(2026, 1, 1))).unwrap();
        assert_eq!(docs[0].title, "DevOps Program - Acme");
        assert_eq!(docs[0].tag, "DevOpsProgram");

        let mut missing = ctx(date(2026, 1, 1));
        missing.solution_program = None;
        assert!(stage_documents(Stage::SolutionDevelopment, &missing).is_err());
    }

    #[test]
    fn test_negotiation_has_no_documents() {
        assert!(stage_documents(Stage::Negotiation, &ctx(date(2026, 1, 1)))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_plan_requires_templates_and_folders() {
        let mut folders = FolderIds {
            account_folder: AccountFolder {
                root_id: "acct".to_string(),
            },
            sales_folder: AreaFolders {
                root_id: "sales".to_string(),
                project_id: "sales-proj".to_string(),
                sub_folders: [("Meeting_Notes".to_string(), "notes".to_string())]
                    .into_iter()
                    .collect(),
            },
            ..Default::default()
        };
        let specs = stage_documents(Stage::LeadValidation, &ctx(date(2026, 1, 1))).unwrap();

        let err = plan_copies(Stage::LeadValidation, specs.clone(), &folders, &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, FlowError::TemplateMissing { .. }));

        let templates: HashMap<String, String> =
            [("KickOffNotes".to_string(), "tpl-1".to_string())]
                .into_iter()
                .collect();
        let plan = plan_copies(Stage::LeadValidation, specs.clone(), &folders, &templates).unwrap();
        assert_eq!(plan[0].folder_id, "notes");
        assert_eq!(plan[0].template_id, "tpl-1");

        folders.sales_folder.sub_folders.clear();
        assert!(plan_copies(Stage::LeadValidation, specs, &folders, &templates).is_err());
    }
}
