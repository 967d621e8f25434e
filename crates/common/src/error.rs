/// Erros de parsing do protocolo RESP.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame incompleto")]
    Incomplete,
    #[error("byte de tipo inválido: {0:#x}")]
    InvalidFrameType(u8),
    #[error("inteiro inválido: {0}")]
    InvalidInteger(String),
    #[error("comprimento de bulk inválido: {0}")]
    InvalidBulkLength(i64),
    #[error("frame excede tamanho máximo ({0} bytes)")]
    FrameTooLarge(usize),
    #[error("encoding inválido: {0}")]
    InvalidEncoding(String),
    #[error("resposta inesperada: {0}")]
    UnexpectedReply(String),
    #[error("comando inválido: {0}")]
    InvalidCommand(String),
}

/// Erros do backend de armazenamento (Redis ou in-memory).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("conexão fechada pelo servidor")]
    ConnectionClosed,
    #[error("erro do servidor: {0}")]
    Server(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("subscription encerrada no canal '{0}'")]
    SubscriptionClosed(String),
}

/// Erros de decodificação de uma entrada armazenada.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("entrada sem separador ':': {0:?}")]
    MissingSeparator(String),
    #[error("tempo de expiração inválido em {entry:?}: {reason}")]
    InvalidExpireTime { entry: String, reason: String },
}

/// Erros produzidos por um consumer.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("consumer desconhecido: {0}")]
    Unknown(String),
    #[error("argumento inválido para o consumer: {0}")]
    InvalidArgument(String),
    #[error("consumer falhou: {0}")]
    Failed(String),
}

/// Erro top-level do Kamikaze.
#[derive(Debug, thiserror::Error)]
pub enum KamikazeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error(transparent)]
    Consumer(#[from] ConsumerError),
    #[error("entrada inválida: {0}")]
    InvalidInput(String),
}

impl KamikazeError {
    /// Indica se o erro deve encerrar o loop de notificação.
    ///
    /// Falhas de store são fatais; uma entrada corrompida só aborta o passe
    /// corrente.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KamikazeError::Store(_))
    }
}

/// Result type alias.
pub type KamikazeResult<T> = Result<T, KamikazeError>;

pub type StoreResult<T> = Result<T, StoreError>;

// Conversão implícita de io::Error → KamikazeError (via StoreError)
impl From<std::io::Error> for KamikazeError {
    fn from(e: std::io::Error) -> Self {
        KamikazeError::Store(StoreError::Io(e))
    }
}

impl From<ProtocolError> for KamikazeError {
    fn from(e: ProtocolError) -> Self {
        KamikazeError::Store(StoreError::Protocol(e))
    }
}
