#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStage {
    LoadingDataset,
    CheckingCache,
    LoadingCachedResult,
    BuildingOcvCurve,
    AnalysingCycles,
    FittingPulses,
    SavingResults,
    Completed,
}

impl BatchStage {
    pub fn label(&self) -> &'static str {
        match self {
            BatchStage::LoadingDataset => "loading dataset",
            BatchStage::CheckingCache => "checking cache",
            BatchStage::LoadingCachedResult => "loading cached run",
            BatchStage::BuildingOcvCurve => "ocv curve",
            BatchStage::AnalysingCycles => "pulse detection",
            BatchStage::FittingPulses => "fitting",
            BatchStage::SavingResults => "saving",
            BatchStage::Completed => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitProgress {
    pub done: usize,
    pub total: usize,
    pub succeeded: usize,
    pub warnings: usize,
    pub failed: usize,
}

impl FitProgress {
    pub fn fraction_complete(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchProgressEvent {
    pub stage: BatchStage,
    pub label: Option<String>,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub fit: Option<FitProgress>,
}

impl BatchProgressEvent {
    pub fn stage(
        stage: BatchStage,
        label: Option<&str>,
        elapsed_wall_s: f64,
        message: Option<String>,
    ) -> Self {
        Self {
            stage,
            label: label.map(str::to_string),
            elapsed_wall_s,
            message,
            fit: None,
        }
    }
}
