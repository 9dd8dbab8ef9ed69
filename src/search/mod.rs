//! Tantivy-based job search index.
//!
//! Full-text search over job postings with per-field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Job;

const BOOST_TITLE: f32 = 10.0;
const BOOST_SKILLS: f32 = 8.0;
const BOOST_DESCRIPTION: f32 = 6.0;
const BOOST_COMPANY: f32 = 4.0;
const BOOST_LOCATION: f32 = 2.0;

/// Search hit: job ID and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub job_id: String,
    pub score: f32,
}

struct SearchFields {
    job_id: Field,
    title: Field,
    required_skills: Field,
    description: Field,
    company: Field,
    location: Field,
}

impl SearchFields {
    fn boosted(&self) -> [(Field, f32); 5] {
        [
            (self.title, BOOST_TITLE),
            (self.required_skills, BOOST_SKILLS),
            (self.description, BOOST_DESCRIPTION),
            (self.company, BOOST_COMPANY),
            (self.location, BOOST_LOCATION),
        ]
    }
}

pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // STRING so the ID is indexed as a single term and delete_term can find it
        let job_id = schema_builder.add_text_field("job_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT);
        let required_skills = schema_builder.add_text_field("required_skills", TEXT);
        let description = schema_builder.add_text_field("description", TEXT);
        let company = schema_builder.add_text_field("company", TEXT);
        let location = schema_builder.add_text_field("location", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            job_id,
            title,
            required_skills,
            description,
            company,
            location,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Replace the index contents with `jobs`.
    pub async fn rebuild(&self, jobs: &[Job]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for job in jobs {
            writer.add_document(self.create_document(job))?;
        }
        writer.commit()?;

        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} jobs", jobs.len());
        Ok(())
    }

    /// Add or replace a single job.
    pub async fn index_job(&self, job: &Job) -> Result<(), AppError> {
        self.index_jobs(std::slice::from_ref(job)).await
    }

    /// Add or replace several jobs in one commit.
    pub async fn index_jobs(&self, jobs: &[Job]) -> Result<(), AppError> {
        if jobs.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.write().await;
        for job in jobs {
            writer.delete_term(Term::from_field_text(self.fields.job_id, &job.id));
            writer.add_document(self.create_document(job))?;
        }
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    pub async fn remove_job(&self, job_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.job_id, job_id));
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    /// Search jobs. A blank query returns nothing.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let all_fields: Vec<Field> = self.fields.boosted().iter().map(|(f, _)| *f).collect();
        let base_query = QueryParser::for_index(&self.index, all_fields)
            .parse_query(query_str)
            .map_err(|e| AppError::BadRequest(format!("Invalid search query: {}", e)))?;

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for (field, boost) in self.fields.boosted() {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
            }
        }

        let combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(limit + offset))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let job_id = doc.get_first(self.fields.job_id)?.as_str()?.to_string();
                Some(SearchResult { job_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, job: &Job) -> TantivyDocument {
        doc!(
            self.fields.job_id => job.id.clone(),
            self.fields.title => job.title.clone(),
            self.fields.required_skills => job.required_skills.join(" "),
            self.fields.description => job.description.clone(),
            self.fields.company => job.company.clone().unwrap_or_default(),
            self.fields.location => job.location.clone().unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SOURCE_HR;
    use tempfile::TempDir;

    fn create_test_job(id: &str, title: &str, description: &str, skills: &[&str]) -> Job {
        Job {
            id: id.to_string(),
            title: title.to_string(),
            company: Some("Acme".to_string()),
            description: description.to_string(),
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            job_type: "Full-time".to_string(),
            location: Some("Berlin".to_string()),
            source: SOURCE_HR.to_string(),
            posted_by: "hr@acme.com".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            embedding: None,
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_search_by_title_and_skill() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let jobs = vec![
            create_test_job("1", "Rust Engineer", "Build storage engines", &["Rust"]),
            create_test_job("2", "Data Analyst", "Dashboards and reports", &["SQL", "Excel"]),
        ];
        index.rebuild(&jobs).await.unwrap();

        let results = index.search("rust", 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].job_id, "1");

        let results = index.search("excel", 10, 0).unwrap();
        assert_eq!(results[0].job_id, "2");
    }

    #[tokio::test]
    async fn test_title_outranks_description() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let jobs = vec![
            create_test_job("1", "Office Manager", "Supports the python team", &[]),
            create_test_job("2", "Python Developer", "Writes services", &[]),
        ];
        index.rebuild(&jobs).await.unwrap();

        let results = index.search("python", 10, 0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].job_id, "2");
    }

    #[tokio::test]
    async fn test_reindex_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        index
            .index_job(&create_test_job("1", "Go Developer", "APIs", &["Go"]))
            .await
            .unwrap();
        index
            .index_job(&create_test_job("1", "Kotlin Developer", "Android apps", &["Kotlin"]))
            .await
            .unwrap();

        assert!(index.search("go", 10, 0).unwrap().is_empty());
        assert_eq!(index.search("kotlin", 10, 0).unwrap().len(), 1);

        index.remove_job("1").await.unwrap();
        assert!(index.search("kotlin", 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pagination() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let jobs: Vec<Job> = (0..5)
            .map(|i| create_test_job(&i.to_string(), "Engineer", "Engineering role", &[]))
            .collect();
        index.rebuild(&jobs).await.unwrap();

        assert_eq!(index.search("engineer", 2, 0).unwrap().len(), 2);
        assert_eq!(index.search("engineer", 10, 3).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let results = index.search("   ", 10, 0).unwrap();
        assert!(results.is_empty());
    }
}
