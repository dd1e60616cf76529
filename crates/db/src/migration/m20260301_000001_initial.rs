//! Initial database migration.
//!
//! Creates the configuration version store, workflow instances, batch run
//! records and the audit log, plus the indexes and triggers that back the
//! engine's single-ACTIVE and single-RUNNING guarantees.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: VERSIONED CONFIGURATION
        // ============================================================
        db.execute_unprepared(CONFIG_VERSIONS_SQL).await?;
        db.execute_unprepared(CONFIG_ACTIVE_POINTERS_SQL).await?;

        // ============================================================
        // PART 2: MAKER-CHECKER WORKFLOW
        // ============================================================
        db.execute_unprepared(WORKFLOW_INSTANCES_SQL).await?;

        // ============================================================
        // PART 3: BATCH RUNS
        // ============================================================
        db.execute_unprepared(BATCH_RECORDS_SQL).await?;

        // ============================================================
        // PART 4: AUDIT LOG
        // ============================================================
        db.execute_unprepared(AUDIT_LOG_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const CONFIG_VERSIONS_SQL: &str = r"
CREATE TABLE config_versions (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    entity_type VARCHAR(32) NOT NULL,
    version INTEGER NOT NULL,
    status VARCHAR(16) NOT NULL,
    parent_id UUID REFERENCES config_versions(id),
    payload JSONB NOT NULL,
    created_by VARCHAR(128) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_config_versions_lineage UNIQUE (entity_id, version),
    CONSTRAINT chk_config_version_positive CHECK (version > 0),
    CONSTRAINT chk_config_status CHECK (status IN ('DRAFT', 'ACTIVE', 'ARCHIVED')),
    CONSTRAINT chk_config_entity_type CHECK (
        entity_type IN ('product', 'fee', 'rule', 'gl_mapping')
    )
);

-- At most one ACTIVE version per lineage, enforced by the database
CREATE UNIQUE INDEX uq_config_versions_one_active
    ON config_versions(entity_id) WHERE status = 'ACTIVE';

-- Live configuration by type (batch jobs, list endpoints)
CREATE INDEX idx_config_versions_active_type
    ON config_versions(entity_type, created_at) WHERE status = 'ACTIVE';
";

const CONFIG_ACTIVE_POINTERS_SQL: &str = r"
-- Lineage -> ACTIVE version. Row absent when nothing is live.
CREATE TABLE config_active_pointers (
    entity_id UUID PRIMARY KEY,
    version_id UUID NOT NULL UNIQUE REFERENCES config_versions(id),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const WORKFLOW_INSTANCES_SQL: &str = r"
CREATE TABLE workflow_instances (
    id UUID PRIMARY KEY,
    definition_id VARCHAR(64) NOT NULL,
    status VARCHAR(16) NOT NULL,
    payload JSONB NOT NULL,
    role_required VARCHAR(64),
    submitted_by VARCHAR(128) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ,
    resolved_by VARCHAR(128),
    resolution_reason TEXT,

    CONSTRAINT chk_workflow_status CHECK (status IN ('PENDING', 'APPROVED', 'REJECTED')),
    CONSTRAINT chk_workflow_resolution CHECK (
        (status = 'PENDING' AND resolved_at IS NULL AND resolved_by IS NULL)
        OR (status <> 'PENDING' AND resolved_at IS NOT NULL AND resolved_by IS NOT NULL)
    ),
    CONSTRAINT chk_workflow_rejection_reason CHECK (
        status <> 'REJECTED' OR length(trim(resolution_reason)) > 0
    )
);

-- Approval queues
CREATE INDEX idx_workflow_pending
    ON workflow_instances(role_required, created_at, id) WHERE status = 'PENDING';
CREATE INDEX idx_workflow_pending_target
    ON workflow_instances((payload->>'version_id')) WHERE status = 'PENDING';
";

const BATCH_RECORDS_SQL: &str = r"
CREATE TABLE batch_records (
    id UUID PRIMARY KEY,
    job_name VARCHAR(128) NOT NULL,
    start_time TIMESTAMPTZ NOT NULL DEFAULT now(),
    end_time TIMESTAMPTZ,
    status VARCHAR(16) NOT NULL,
    error_log TEXT,
    triggered_by VARCHAR(128) NOT NULL,
    trigger_source VARCHAR(16) NOT NULL,

    CONSTRAINT chk_batch_status CHECK (status IN ('RUNNING', 'COMPLETED', 'FAILED')),
    CONSTRAINT chk_batch_trigger CHECK (trigger_source IN ('MANUAL', 'TIMER')),
    CONSTRAINT chk_batch_end_time CHECK ((status = 'RUNNING') = (end_time IS NULL))
);

-- At most one RUNNING record per job, across every node sharing the database
CREATE UNIQUE INDEX uq_batch_records_one_running
    ON batch_records(job_name) WHERE status = 'RUNNING';

-- Batch monitor history
CREATE INDEX idx_batch_records_history ON batch_records(job_name, start_time DESC);
CREATE INDEX idx_batch_records_recent ON batch_records(start_time DESC);
";

const AUDIT_LOG_SQL: &str = r"
CREATE TABLE audit_log (
    id UUID PRIMARY KEY,
    occurred_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    actor VARCHAR(128) NOT NULL,
    kind VARCHAR(32) NOT NULL,
    entity_id UUID,
    instance_id UUID,
    job_name VARCHAR(128),
    event JSONB NOT NULL
);

CREATE INDEX idx_audit_log_recent ON audit_log(occurred_at DESC, id DESC);
CREATE INDEX idx_audit_log_entity ON audit_log(entity_id, occurred_at DESC) WHERE entity_id IS NOT NULL;
CREATE INDEX idx_audit_log_instance ON audit_log(instance_id) WHERE instance_id IS NOT NULL;
CREATE INDEX idx_audit_log_job ON audit_log(job_name, occurred_at DESC) WHERE job_name IS NOT NULL;
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_archived_modification
-- ARCHIVED versions are read-only history
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_archived_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'ARCHIVED' THEN
        RAISE EXCEPTION 'Cannot modify archived configuration version %', OLD.id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_archived_modification
BEFORE UPDATE ON config_versions
FOR EACH ROW
EXECUTE FUNCTION prevent_archived_modification();

-- ============================================================
-- FUNCTION: prevent_resolved_modification
-- A resolved instance never changes again
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_resolved_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status <> 'PENDING' THEN
        RAISE EXCEPTION 'Cannot modify resolved workflow instance %', OLD.id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_resolved_modification
BEFORE UPDATE ON workflow_instances
FOR EACH ROW
EXECUTE FUNCTION prevent_resolved_modification();

-- ============================================================
-- FUNCTION: audit_log_append_only
-- ============================================================
CREATE OR REPLACE FUNCTION audit_log_append_only()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'audit_log is append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_audit_log_append_only
BEFORE UPDATE OR DELETE ON audit_log
FOR EACH ROW
EXECUTE FUNCTION audit_log_append_only();
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS audit_log CASCADE;
DROP TABLE IF EXISTS batch_records CASCADE;
DROP TABLE IF EXISTS workflow_instances CASCADE;
DROP TABLE IF EXISTS config_active_pointers CASCADE;
DROP TABLE IF EXISTS config_versions CASCADE;
DROP FUNCTION IF EXISTS audit_log_append_only();
DROP FUNCTION IF EXISTS prevent_resolved_modification();
DROP FUNCTION IF EXISTS prevent_archived_modification();
";
